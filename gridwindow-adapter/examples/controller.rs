// Example: a controller over an in-memory data source, behind a response cache.
use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use gridwindow::{
    ColumnDescriptor, ColumnLayout, DataSlice, ElementKind, FetchError, GridOptions, PinnedSide,
    PreloadRange, RenderNode,
};
use gridwindow_adapter::{
    CachedGateway, DataFetchGateway, Filter, FilterOperator, GridController, GridEvent,
    ManualClock, QuerySpec, WindowQuery,
};

struct Cell;

impl RenderNode for Cell {
    fn create(_: ElementKind) -> Self {
        Cell
    }
}

/// Answers every request immediately from a generated table.
struct InMemory {
    rows: usize,
}

impl DataFetchGateway for InMemory {
    type Record = String;

    fn get_total_count(
        &self,
        _filters: &[Filter],
    ) -> LocalBoxFuture<'static, Result<usize, FetchError>> {
        future::ready(Ok(self.rows)).boxed_local()
    }

    fn get_window(
        &self,
        query: &WindowQuery,
    ) -> LocalBoxFuture<'static, Result<DataSlice<String>, FetchError>> {
        let h = query.item_height as u64;
        let start = ((query.viewport_start / h) as usize).saturating_sub(20);
        let end = (query.viewport_end.div_ceil(h) as usize + 20).min(self.rows);
        let items = (start..end).map(|i| format!("row {i}")).collect();
        future::ready(Ok(DataSlice::new(items, start))).boxed_local()
    }

    fn preload(
        &self,
        ranges: &[PreloadRange],
        _query: &QuerySpec,
    ) -> LocalBoxFuture<'static, Result<(), FetchError>> {
        println!("preload {ranges:?}");
        future::ready(Ok(())).boxed_local()
    }
}

fn main() {
    let clock = ManualClock::new(0);
    let options = GridOptions::new().with_viewport(1280, 720);
    let layout = ColumnLayout::new(
        (0..40)
            .map(|i| ColumnDescriptor::new(format!("field_{i}"), 120).with_order(i))
            .collect(),
    )
    .expect("valid layout");

    let gateway = CachedGateway::from_options(InMemory { rows: 250_000 }, clock.clone(), &options);
    let mut grid: GridController<_, Cell, _> =
        GridController::new(gateway, clock.clone(), options, layout, 250_000)
            .expect("valid options");
    grid.subscribe(|event| {
        if !matches!(event, GridEvent::WindowChanged(_)) {
            println!("{event:?}");
        }
    });
    grid.pin_column("field_0", PinnedSide::Left)
        .expect("column exists");

    // A fast flick downwards, then let the scroll-end debounce fire.
    for step in 1..=8u64 {
        clock.set(step * 20);
        grid.on_vertical_scroll(step * 2_000);
        grid.tick();
    }
    clock.advance(200);
    grid.tick();

    println!(
        "rows visible={:?} rendered={:?}",
        grid.rows().visible_range(),
        grid.rows().rendered_range()
    );
    println!("columns {:?}", grid.columns().rendering_info());
    println!("cache {:?}", grid.gateway().stats());

    grid.set_query(QuerySpec::new().with_filter(Filter::new(
        "status",
        FilterOperator::Eq,
        "Open",
    )));
    grid.pump();
    println!("after query change: {:?}", grid.rows().record(grid.rows().visible_range().start));
}
