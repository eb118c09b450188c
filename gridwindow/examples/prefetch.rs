// Example: scroll tracking with an injected clock and velocity-based prefetch planning.
use gridwindow::{
    Axis, GridOptions, PatternContext, PrefetchPlanner, RecyclePool, RenderNode, RowWindow,
    ScrollTracker, VelocityAnalyzer, ViewportState,
};

struct Row;

impl RenderNode for Row {
    fn create(_: gridwindow::ElementKind) -> Self {
        Row
    }
}

fn main() {
    let opts = GridOptions::new().with_viewport(800, 600);
    let mut rows = RowWindow::<()>::new(&opts, 100_000).expect("valid options");
    let mut pool = RecyclePool::<Row>::new();
    let mut tracker = ScrollTracker::new(&opts).expect("valid options");
    let mut planner = PrefetchPlanner::new(Axis::Vertical, &opts).expect("valid options");

    // A steady flick: 300px every 16ms.
    let mut now = 0u64;
    for step in 0..10u64 {
        let tick = tracker.record(step * 300, now);
        if tick.recompute {
            rows.recompute(ViewportState::new(tracker.position(), 600), &mut pool);
        }
        now += 16;
    }

    now += opts.scroll_end_debounce_ms;
    let tick = tracker.poll(now);
    if tick.recompute {
        rows.recompute(ViewportState::new(tracker.position(), 600), &mut pool);
    }

    if let Some(end) = tick.scroll_end {
        println!("scroll end at {}px, velocity {:.2}px/ms", end.position, end.velocity);
        println!("metrics: {:?}", tracker.metrics());

        let ctx = PatternContext {
            axis: Axis::Vertical,
            rendered: rows.rendered_range(),
            total: rows.total_count(),
            unit_size: rows.item_height() as f64,
            positions: None,
        };
        let preloads = planner.on_scroll_end(&tracker.samples(), &VelocityAnalyzer::rows(), &ctx);
        println!("visible={:?} preload={preloads:?}", rows.visible_range());
    }
}
