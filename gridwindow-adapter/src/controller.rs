use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use gridwindow::{
    Axis, ColumnDescriptor, ColumnLayout, ColumnWindow, ConfigError, DataSlice, FetchError,
    FrameState, GridOptions, PatternContext, PinnedSide, PrefetchPlanner, PreloadRange,
    RecyclePool, RenderNode, RowWindow, ScrollEnd, ScrollSample, ScrollTracker, ViewportState,
    WindowChange, WindowRequest, threshold_ranges,
};

use crate::events::Listeners;
use crate::{
    CacheScope, Clock, DataFetchGateway, GridEvent, QuerySpec, SubscriptionId, SystemClock,
    WindowQuery,
};

type WindowFuture<R> = LocalBoxFuture<'static, (WindowRequest, Result<DataSlice<R>, FetchError>)>;
type PreloadFuture = LocalBoxFuture<'static, (Vec<PreloadRange>, Result<(), FetchError>)>;

/// Wires both windows, a scroll tracker and prefetch planner per axis, and a data gateway.
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `on_vertical_scroll` / `on_horizontal_scroll` / `on_resize` when UI events occur
/// - `tick()` from a frame or timer callback (throttle flush, scroll-end detection, prefetch)
///
/// Scroll callbacks never wait on the gateway. Requests are kept in flight and their responses
/// are applied by `pump()` (called from `tick()`) or awaited with `settle()`.
pub struct GridController<G: DataFetchGateway, E, C = SystemClock> {
    gateway: G,
    clock: C,
    options: GridOptions,
    query: QuerySpec,
    frame: FrameState,

    pool: RecyclePool<E>,
    rows: RowWindow<G::Record>,
    columns: ColumnWindow,
    vertical: ScrollTracker,
    horizontal: ScrollTracker,
    row_planner: PrefetchPlanner,
    column_planner: PrefetchPlanner,

    fetches: FuturesUnordered<WindowFuture<G::Record>>,
    preloads: FuturesUnordered<PreloadFuture>,
    listeners: Listeners,
}

impl<G, E, C> GridController<G, E, C>
where
    G: DataFetchGateway,
    E: RenderNode,
    C: Clock,
{
    /// Builds a controller and renders the initial window for the configured viewport.
    pub fn new(
        gateway: G,
        clock: C,
        options: GridOptions,
        layout: ColumnLayout,
        total_count: usize,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let mut controller = Self {
            frame: FrameState {
                vertical: ViewportState::new(0, options.viewport_height),
                horizontal: ViewportState::new(0, options.viewport_width),
            },
            pool: RecyclePool::with_capacity(options.pool_capacity),
            rows: RowWindow::new(&options, total_count)?,
            columns: ColumnWindow::new(&options, layout)?,
            vertical: ScrollTracker::new(&options)?,
            horizontal: ScrollTracker::new(&options)?,
            row_planner: PrefetchPlanner::new(Axis::Vertical, &options)?,
            column_planner: PrefetchPlanner::new(Axis::Horizontal, &options)?,
            fetches: FuturesUnordered::new(),
            preloads: FuturesUnordered::new(),
            listeners: Listeners::default(),
            query: QuerySpec::default(),
            gateway,
            clock,
            options,
        };
        controller.recompute_rows();
        controller.recompute_columns();
        Ok(controller)
    }

    pub fn with_query(mut self, query: QuerySpec) -> Self {
        self.set_query(query);
        self
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn frame_state(&self) -> FrameState {
        self.frame
    }

    pub fn rows(&self) -> &RowWindow<G::Record> {
        &self.rows
    }

    pub fn columns(&self) -> &ColumnWindow {
        &self.columns
    }

    pub fn pool(&self) -> &RecyclePool<E> {
        &self.pool
    }

    pub fn vertical_tracker(&self) -> &ScrollTracker {
        &self.vertical
    }

    pub fn horizontal_tracker(&self) -> &ScrollTracker {
        &self.horizontal
    }

    pub fn row_planner(&self) -> &PrefetchPlanner {
        &self.row_planner
    }

    pub fn column_planner(&self) -> &PrefetchPlanner {
        &self.column_planner
    }

    /// Window requests whose response has not been applied yet.
    pub fn pending_fetches(&self) -> usize {
        self.fetches.len()
    }

    /// Preload requests still outstanding. Each carries one planning cycle's ranges.
    pub fn pending_preloads(&self) -> usize {
        self.preloads.len()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&GridEvent) + 'static) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Call this when the UI reports a vertical scroll offset change.
    ///
    /// Returns the window change if the throttle let this event recompute immediately.
    pub fn on_vertical_scroll(&mut self, offset: u64) -> Option<WindowChange> {
        let now = self.clock.now_ms();
        self.frame.vertical.scroll_offset = offset;
        let tick = self.vertical.record(offset, now);
        tick.recompute.then(|| self.recompute_rows())
    }

    pub fn on_horizontal_scroll(&mut self, offset: u64) -> Option<WindowChange> {
        let now = self.clock.now_ms();
        self.frame.horizontal.scroll_offset = offset;
        let tick = self.horizontal.record(offset, now);
        tick.recompute.then(|| self.recompute_columns())
    }

    /// Resizes the viewport and recomputes both axes immediately.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.frame.vertical.viewport_size = height;
        self.frame.horizontal.viewport_size = width;
        self.recompute_rows();
        self.recompute_columns();
    }

    /// Restores a previously captured scroll position on both axes.
    pub fn restore(&mut self, frame: FrameState) {
        self.frame = frame;
        self.recompute_rows();
        self.recompute_columns();
    }

    /// Advances timers and applies ready responses. Returns the number of responses handled.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now_ms();

        let v = self.vertical.poll(now);
        if v.recompute {
            self.recompute_rows();
        }
        if let Some(end) = v.scroll_end {
            self.on_scroll_end(Axis::Vertical, end);
        }

        let h = self.horizontal.poll(now);
        if h.recompute {
            self.recompute_columns();
        }
        if let Some(end) = h.scroll_end {
            self.on_scroll_end(Axis::Horizontal, end);
        }

        self.pump()
    }

    /// Applies every response that is already available, without waiting.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(Some((request, result))) = self.fetches.next().now_or_never() {
            self.handle_window(request, result);
            handled += 1;
        }
        while let Some(Some((ranges, result))) = self.preloads.next().now_or_never() {
            self.handle_preload(ranges, result);
            handled += 1;
        }
        handled
    }

    /// Waits for every outstanding window request and preload.
    pub async fn settle(&mut self) -> usize {
        let mut handled = 0;
        while let Some((request, result)) = self.fetches.next().await {
            self.handle_window(request, result);
            handled += 1;
        }
        while let Some((ranges, result)) = self.preloads.next().await {
            self.handle_preload(ranges, result);
            handled += 1;
        }
        handled
    }

    /// Asks the gateway for the row count under the current filters and re-windows.
    ///
    /// On failure the previous count is kept.
    pub async fn refresh_total_count(&mut self) -> Result<usize, FetchError> {
        let count = match self.gateway.get_total_count(&self.query.filters).await {
            Ok(count) => count,
            Err(error) => {
                gwarn!(error = %error, "GridController: total count request failed");
                return Err(error);
            }
        };
        if count != self.rows.total_count() {
            self.rows.set_total_count(count);
            self.listeners.emit(&GridEvent::TotalCountChanged(count));
            self.recompute_rows();
        }
        Ok(count)
    }

    /// Replaces filters/sort/columns. Cached responses of the previous query are dropped and
    /// every in-flight response becomes stale.
    pub fn set_query(&mut self, query: QuerySpec) {
        if query == self.query {
            return;
        }
        let previous = core::mem::replace(&mut self.query, query);
        self.gateway
            .invalidate_cache(&CacheScope::Query(previous.fingerprint()));
        self.discard_data();
    }

    /// Drops held data for the current query and requests it again.
    pub fn reload(&mut self) {
        self.gateway
            .invalidate_cache(&CacheScope::Query(self.query.fingerprint()));
        self.discard_data();
    }

    pub fn set_column_width(
        &mut self,
        fieldname: &str,
        width: u32,
    ) -> Result<WindowChange, ConfigError> {
        self.columns.set_width(fieldname, width)?;
        Ok(self.recompute_columns())
    }

    pub fn move_column(
        &mut self,
        fieldname: &str,
        position: usize,
    ) -> Result<WindowChange, ConfigError> {
        self.columns.move_column(fieldname, position)?;
        Ok(self.recompute_columns())
    }

    pub fn pin_column(
        &mut self,
        fieldname: &str,
        side: PinnedSide,
    ) -> Result<WindowChange, ConfigError> {
        self.columns.pin(fieldname, side)?;
        Ok(self.recompute_columns())
    }

    pub fn insert_column(&mut self, column: ColumnDescriptor) -> Result<WindowChange, ConfigError> {
        self.columns.insert_column(column)?;
        Ok(self.recompute_columns())
    }

    pub fn remove_column(&mut self, fieldname: &str) -> Result<ColumnDescriptor, ConfigError> {
        let removed = self.columns.remove_column(fieldname)?;
        self.recompute_columns();
        Ok(removed)
    }

    pub fn set_layout(&mut self, layout: ColumnLayout) -> WindowChange {
        self.columns.set_layout(layout);
        self.recompute_columns()
    }

    /// Releases every element, drops in-flight work and forgets scroll history.
    pub fn teardown(&mut self) {
        self.fetches = FuturesUnordered::new();
        self.preloads = FuturesUnordered::new();
        self.rows.teardown(&mut self.pool);
        self.columns.teardown(&mut self.pool);
        self.row_planner.reset();
        self.column_planner.reset();
        self.vertical.reset();
        self.horizontal.reset();
        self.pool.clear();
        gdebug!("GridController::teardown");
    }

    fn discard_data(&mut self) {
        self.rows.invalidate(&mut self.pool);
        self.row_planner.reset();
        self.column_planner.reset();
        self.preloads = FuturesUnordered::new();
        self.recompute_rows();
    }

    fn recompute_rows(&mut self) -> WindowChange {
        let update = self.rows.recompute(self.frame.vertical, &mut self.pool);
        if let Some(request) = update.request {
            self.dispatch_window(request);
        }
        if !update.change.is_noop() {
            self.listeners.emit(&GridEvent::WindowChanged(update.change));
        }
        update.change
    }

    fn recompute_columns(&mut self) -> WindowChange {
        let change = self.columns.recompute(self.frame.horizontal, &mut self.pool);
        if !change.is_noop() {
            self.listeners.emit(&GridEvent::WindowChanged(change));
        }
        change
    }

    fn dispatch_window(&mut self, request: WindowRequest) {
        let query = WindowQuery::from_request(&request, &self.query);
        gtrace!(
            ticket = request.ticket.0,
            viewport_start = query.viewport_start,
            viewport_end = query.viewport_end,
            "GridController: requesting window"
        );
        let fut = self.gateway.get_window(&query);
        self.fetches
            .push(fut.map(move |result| (request, result)).boxed_local());
    }

    fn handle_window(
        &mut self,
        request: WindowRequest,
        result: Result<DataSlice<G::Record>, FetchError>,
    ) {
        let event = match result {
            Ok(slice) => match self.rows.apply_response(&request, slice, &mut self.pool) {
                Ok(backed) => GridEvent::DataApplied {
                    ticket: request.ticket,
                    backed,
                },
                Err(stale) => GridEvent::StaleDiscarded(stale),
            },
            Err(error) => GridEvent::FetchFailed {
                ticket: request.ticket,
                error: self.rows.apply_failure(&request, error),
            },
        };
        self.listeners.emit(&event);
    }

    fn on_scroll_end(&mut self, axis: Axis, end: ScrollEnd) {
        self.listeners.emit(&GridEvent::ScrollEnd { axis, end });

        let dispatched = match axis {
            Axis::Vertical => {
                let ctx = PatternContext {
                    axis,
                    rendered: self.rows.rendered_range(),
                    total: self.rows.total_count(),
                    unit_size: self.rows.item_height() as f64,
                    positions: None,
                };
                let threshold = threshold_ranges(
                    self.rows.visible_range(),
                    ctx.rendered,
                    ctx.total,
                    self.options.preload_threshold,
                    self.rows.buffer_size(),
                );
                let gateway = &self.gateway;
                let analyzer = move |history: &[ScrollSample], context: &PatternContext<'_>| {
                    let mut ranges = gateway.analyze_scroll_pattern(history, context);
                    ranges.extend(threshold.iter().copied());
                    ranges
                };
                let samples = self.vertical.samples();
                self.row_planner.on_scroll_end(&samples, &analyzer, &ctx)
            }
            Axis::Horizontal => {
                let count = self.columns.regular_count();
                if count == 0 {
                    return;
                }
                let ctx = PatternContext {
                    axis,
                    rendered: self.columns.rendered_range(),
                    total: count,
                    unit_size: self.columns.regular_width() as f64 / count as f64,
                    positions: Some(self.columns.positions()),
                };
                let gateway = &self.gateway;
                let analyzer = |history: &[ScrollSample], context: &PatternContext<'_>| {
                    gateway.analyze_scroll_pattern(history, context)
                };
                let samples = self.horizontal.samples();
                self.column_planner.on_scroll_end(&samples, &analyzer, &ctx)
            }
        };

        self.dispatch_preloads(dispatched);
    }

    /// Sends one planning cycle's ranges to the gateway as a single request.
    fn dispatch_preloads(&mut self, ranges: Vec<PreloadRange>) {
        if ranges.is_empty() {
            return;
        }
        let fut = self.gateway.preload(&ranges, &self.query);
        for range in &ranges {
            self.listeners.emit(&GridEvent::PreloadDispatched(*range));
        }
        self.preloads
            .push(fut.map(move |result| (ranges, result)).boxed_local());
    }

    fn handle_preload(&mut self, ranges: Vec<PreloadRange>, result: Result<(), FetchError>) {
        for range in &ranges {
            match range.axis {
                Axis::Vertical => self.row_planner.settle(range.range),
                Axis::Horizontal => self.column_planner.settle(range.range),
            };
        }
        let Err(error) = result else {
            return;
        };
        gwarn!(
            ranges = ranges.len(),
            error = %error,
            "GridController: preload failed"
        );
        for range in ranges {
            self.listeners.emit(&GridEvent::PreloadFailed {
                range,
                error: error.clone(),
            });
        }
    }
}
