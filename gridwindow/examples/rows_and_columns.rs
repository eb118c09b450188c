// Example: windowing both axes of a grid and recycling elements between frames.
use gridwindow::{
    ColumnDescriptor, ColumnLayout, ColumnWindow, DataSlice, ElementKind, GridOptions,
    PinnedSide, RecyclePool, RenderNode, RowWindow, ViewportState,
};

#[derive(Debug)]
struct Cell {
    kind: ElementKind,
}

impl RenderNode for Cell {
    fn create(kind: ElementKind) -> Self {
        Cell { kind }
    }
}

fn main() {
    let opts = GridOptions::new()
        .with_item_height(32)
        .with_buffer_size(20)
        .with_buffer_columns(2)
        .with_viewport(1_280, 720);

    let mut pool = RecyclePool::<Cell>::with_capacity(Some(256));
    let mut rows = RowWindow::<String>::new(&opts, 1_000_000).expect("valid options");

    let mut columns: Vec<ColumnDescriptor> = (0..40)
        .map(|i| {
            ColumnDescriptor::new(format!("field_{i}"), 120 + (i % 4) * 30).with_order(i as i32)
        })
        .collect();
    columns.push(ColumnDescriptor::new("name", 200).with_pinned(PinnedSide::Left));
    let layout = ColumnLayout::new(columns).expect("valid layout");
    let mut cols = ColumnWindow::new(&opts, layout).expect("valid options");

    let update = rows.recompute(ViewportState::new(64_000, 720), &mut pool);
    println!("rows: {:?}", update.change);

    // Pretend the gateway answered with its own buffered slice.
    if let Some(req) = update.request {
        let items = req.origin.iter().map(|i| format!("row {i}")).collect();
        let backed = rows
            .apply_response(&req, DataSlice::new(items, req.origin.start), &mut pool)
            .expect("fresh response");
        println!("rows backed by data: {backed}");
    }

    let change = cols.recompute(ViewportState::new(2_400, 1_280), &mut pool);
    println!("columns: {change:?}");
    println!("rendering info: {:?}", cols.rendering_info());

    let change = cols.recompute(ViewportState::new(0, 1_280), &mut pool);
    println!("columns after scrolling back: {change:?}");

    let stats = pool.stats();
    println!(
        "pool: active={} created={} reused={}",
        pool.active_len(),
        stats.created,
        stats.reused
    );

    let first = rows.element(rows.rendered_range().start).and_then(|id| pool.get(id));
    if let Some(el) = first {
        println!("first row element: kind={:?} offset={}", el.node.kind, el.offset);
    }
}
