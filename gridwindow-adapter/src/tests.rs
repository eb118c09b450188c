use crate::*;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::{self, LocalBoxFuture};
use gridwindow::{
    Axis, ColumnDescriptor, ColumnLayout, ConfigError, DataSlice, ElementKind, FetchError,
    GridOptions, IndexRange, PatternAnalyzer, PatternContext, PreloadRange, RenderNode,
    ScrollSample, VelocityAnalyzer,
};

const GATEWAY_BUFFER: usize = 50;

#[derive(Debug)]
struct Node;

impl RenderNode for Node {
    fn create(_kind: ElementKind) -> Self {
        Node
    }
}

type WindowReply = oneshot::Sender<Result<DataSlice<u32>, FetchError>>;
type PreloadReply = oneshot::Sender<Result<(), FetchError>>;

/// Holds every request open until the test answers it.
#[derive(Default)]
struct MockGateway {
    total: Cell<usize>,
    window_calls: Cell<usize>,
    windows: RefCell<VecDeque<(WindowQuery, WindowReply)>>,
    preloads: RefCell<VecDeque<(Vec<PreloadRange>, PreloadReply)>>,
    invalidated: RefCell<Vec<CacheScope>>,
    /// Replaces the velocity analyzer's prediction when non-empty.
    predictions: RefCell<Vec<IndexRange>>,
}

impl MockGateway {
    fn new(total: usize) -> Self {
        let gateway = Self::default();
        gateway.total.set(total);
        gateway
    }

    fn pending_windows(&self) -> usize {
        self.windows.borrow().len()
    }

    /// Answers the oldest window request with the rows it asked for plus a buffer.
    fn answer_window(&self) -> WindowQuery {
        let (query, reply) = self.windows.borrow_mut().pop_front().unwrap();
        let h = query.item_height as u64;
        let start = ((query.viewport_start / h) as usize).saturating_sub(GATEWAY_BUFFER);
        let end = (query.viewport_end.div_ceil(h) as usize + GATEWAY_BUFFER).min(self.total.get());
        let items = (start..end).map(|i| i as u32).collect();
        reply.send(Ok(DataSlice::new(items, start))).unwrap();
        query
    }

    fn fail_window(&self, error: FetchError) {
        let (_, reply) = self.windows.borrow_mut().pop_front().unwrap();
        reply.send(Err(error)).unwrap();
    }

    fn answer_preload(&self, result: Result<(), FetchError>) -> Vec<PreloadRange> {
        let (ranges, reply) = self.preloads.borrow_mut().pop_front().unwrap();
        reply.send(result).unwrap();
        ranges
    }
}

impl DataFetchGateway for MockGateway {
    type Record = u32;

    fn get_total_count(
        &self,
        _filters: &[Filter],
    ) -> LocalBoxFuture<'static, Result<usize, FetchError>> {
        future::ready(Ok(self.total.get())).boxed_local()
    }

    fn get_window(
        &self,
        query: &WindowQuery,
    ) -> LocalBoxFuture<'static, Result<DataSlice<u32>, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.window_calls.set(self.window_calls.get() + 1);
        self.windows.borrow_mut().push_back((query.clone(), tx));
        rx.map(|r| r.unwrap_or(Err(FetchError::Cancelled)))
            .boxed_local()
    }

    fn preload(
        &self,
        ranges: &[PreloadRange],
        _query: &QuerySpec,
    ) -> LocalBoxFuture<'static, Result<(), FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.preloads.borrow_mut().push_back((ranges.to_vec(), tx));
        rx.map(|r| r.unwrap_or(Err(FetchError::Cancelled)))
            .boxed_local()
    }

    fn analyze_scroll_pattern(
        &self,
        history: &[ScrollSample],
        context: &PatternContext<'_>,
    ) -> Vec<IndexRange> {
        let predictions = self.predictions.borrow();
        if predictions.is_empty() {
            VelocityAnalyzer::for_axis(context.axis).analyze(history, context)
        } else {
            predictions.clone()
        }
    }

    fn invalidate_cache(&self, scope: &CacheScope) {
        self.invalidated.borrow_mut().push(*scope);
    }
}

type TestController = GridController<Rc<MockGateway>, Node, ManualClock>;

fn layout() -> ColumnLayout {
    let columns = (0..15)
        .map(|i| ColumnDescriptor::new(format!("c{i}"), 200).with_order(i))
        .collect();
    ColumnLayout::new(columns).unwrap()
}

fn controller(total: usize) -> (TestController, Rc<MockGateway>, ManualClock) {
    let gateway = Rc::new(MockGateway::new(total));
    let clock = ManualClock::new(0);
    let options = GridOptions::new().with_viewport(1200, 600);
    let c = GridController::new(Rc::clone(&gateway), clock.clone(), options, layout(), total)
        .unwrap();
    (c, gateway, clock)
}

fn record_events(c: &mut TestController) -> Rc<RefCell<Vec<GridEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    c.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

#[test]
fn initial_window_is_requested_and_applied() {
    let (mut c, gateway, _clock) = controller(10_000);
    let events = record_events(&mut c);

    assert_eq!(c.rows().rendered_range(), IndexRange::new(0, 65));
    assert_eq!(c.pending_fetches(), 1);

    let query = gateway.answer_window();
    assert_eq!((query.viewport_start, query.viewport_end), (0, 600));
    assert_eq!(query.item_height, 40);

    assert_eq!(c.pump(), 1);
    assert_eq!(c.pending_fetches(), 0);
    assert_eq!(c.rows().record(64), Some(&64));
    assert!(matches!(
        events.borrow().as_slice(),
        [GridEvent::DataApplied { backed: 65, .. }]
    ));
}

#[test]
fn pump_without_responses_does_nothing() {
    let (mut c, _gateway, _clock) = controller(10_000);
    assert_eq!(c.pump(), 0);
    assert_eq!(c.pending_fetches(), 1);
}

#[test]
fn response_for_abandoned_window_is_discarded() {
    let (mut c, gateway, _clock) = controller(10_000);
    let events = record_events(&mut c);

    let change = c.on_vertical_scroll(40_000).unwrap();
    assert_eq!(change.visible, IndexRange::new(1000, 1015));
    assert_eq!(gateway.pending_windows(), 2);

    gateway.answer_window();
    c.pump();
    assert!(c.rows().slice().is_none());
    assert!(matches!(
        events.borrow().last(),
        Some(GridEvent::StaleDiscarded(_))
    ));

    gateway.answer_window();
    c.pump();
    assert_eq!(c.rows().record(1000), Some(&1000));
    assert!(matches!(
        events.borrow().last(),
        Some(GridEvent::DataApplied { backed: 115, .. })
    ));
}

#[test]
fn scroll_events_are_throttled() {
    let (mut c, gateway, clock) = controller(10_000);

    assert!(c.on_vertical_scroll(4_000).is_some());
    clock.set(5);
    assert!(c.on_vertical_scroll(8_000).is_none());
    assert_eq!(c.rows().visible_range().start, 100);
    assert_eq!(gateway.window_calls.get(), 2);

    clock.set(16);
    c.tick();
    assert_eq!(c.rows().visible_range().start, 200);
    assert_eq!(gateway.window_calls.get(), 3);
}

#[test]
fn settle_awaits_every_outstanding_request() {
    let (mut c, gateway, _clock) = controller(10_000);
    gateway.answer_window();
    assert_eq!(block_on(c.settle()), 1);
    assert!(c.rows().slice().is_some());
}

#[test]
fn fetch_failure_is_reported_and_rendering_continues() {
    let (mut c, gateway, _clock) = controller(10_000);
    let events = record_events(&mut c);

    gateway.fail_window(FetchError::Unavailable);
    c.pump();

    assert_eq!(c.rows().last_error(), Some(&FetchError::Unavailable));
    assert_eq!(c.rows().rendered_len(), 65);
    assert!(matches!(
        events.borrow().as_slice(),
        [GridEvent::FetchFailed {
            error: FetchError::Unavailable,
            ..
        }]
    ));
}

#[test]
fn scroll_end_dispatches_predicted_preload() {
    let (mut c, gateway, clock) = controller(10_000);
    let events = record_events(&mut c);

    for (i, offset) in [0u64, 4_000, 8_000, 12_000, 16_000].into_iter().enumerate() {
        clock.set(i as u64 * 100);
        c.on_vertical_scroll(offset);
    }
    clock.set(550);
    c.tick();

    // 40 px/ms for 2s ahead of 16000px, in 40px rows.
    let expected = PreloadRange {
        axis: Axis::Vertical,
        range: IndexRange::new(2400, 4400),
    };
    assert_eq!(c.row_planner().in_flight(), &[expected.range]);
    assert_eq!(c.pending_preloads(), 1);
    {
        let events = events.borrow();
        assert!(events.iter().any(|e| matches!(
            e,
            GridEvent::ScrollEnd {
                axis: Axis::Vertical,
                ..
            }
        )));
        assert!(events.contains(&GridEvent::PreloadDispatched(expected)));
    }

    assert_eq!(gateway.answer_preload(Ok(())), vec![expected]);
    c.pump();
    assert!(c.row_planner().in_flight().is_empty());
    assert_eq!(c.pending_preloads(), 0);
}

#[test]
fn one_cycle_preloads_in_a_single_request() {
    let (mut c, gateway, clock) = controller(10_000);
    let events = record_events(&mut c);
    *gateway.predictions.borrow_mut() = vec![
        IndexRange::new(1_000, 1_100),
        IndexRange::new(2_000, 2_100),
        IndexRange::new(3_000, 3_100),
        IndexRange::new(4_000, 4_100),
    ];

    for (i, offset) in [0u64, 4_000, 8_000, 12_000, 16_000].into_iter().enumerate() {
        clock.set(i as u64 * 100);
        c.on_vertical_scroll(offset);
    }
    clock.set(550);
    c.tick();

    assert_eq!(c.pending_preloads(), 1);
    assert_eq!(gateway.preloads.borrow().len(), 1);
    let dispatched = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, GridEvent::PreloadDispatched(_)))
        .count();
    assert_eq!(dispatched, 3);

    // The batch holds three ranges; the fourth waits for the next cycle.
    let sent: Vec<IndexRange> = gateway
        .answer_preload(Ok(()))
        .iter()
        .map(|p| p.range)
        .collect();
    assert_eq!(
        sent,
        [
            IndexRange::new(1_000, 1_100),
            IndexRange::new(2_000, 2_100),
            IndexRange::new(3_000, 3_100),
        ]
    );
    assert_eq!(
        c.row_planner().queued().collect::<Vec<_>>(),
        [IndexRange::new(4_000, 4_100)]
    );

    assert_eq!(c.pump(), 1);
    assert!(c.row_planner().in_flight().is_empty());
    assert_eq!(c.pending_preloads(), 0);
}

#[test]
fn failed_preload_is_reported_once() {
    let (mut c, gateway, clock) = controller(10_000);
    let events = record_events(&mut c);

    for (i, offset) in [0u64, 4_000, 8_000, 12_000, 16_000].into_iter().enumerate() {
        clock.set(i as u64 * 100);
        c.on_vertical_scroll(offset);
    }
    clock.set(550);
    c.tick();

    gateway.answer_preload(Err(FetchError::failed("timeout")));
    c.tick();

    assert!(c.row_planner().in_flight().is_empty());
    assert!(gateway.preloads.borrow().is_empty());
    let failures = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, GridEvent::PreloadFailed { .. }))
        .count();
    assert_eq!(failures, 1);
}

#[test]
fn too_few_samples_skip_prefetch() {
    let (mut c, gateway, clock) = controller(10_000);
    c.on_vertical_scroll(4_000);
    clock.set(200);
    c.tick();

    assert!(!c.vertical_tracker().is_scrolling());
    assert!(gateway.preloads.borrow().is_empty());
}

#[test]
fn query_change_invalidates_cache_and_refetches() {
    let (mut c, gateway, _clock) = controller(10_000);
    let events = record_events(&mut c);
    let previous = c.query().fingerprint();

    c.set_query(
        QuerySpec::new().with_filter(Filter::new("status", FilterOperator::In, "Open")),
    );
    assert_eq!(
        gateway.invalidated.borrow().as_slice(),
        &[CacheScope::Query(previous)]
    );
    assert_eq!(gateway.pending_windows(), 2);

    // The request issued for the old query is stale even though it covers the window.
    gateway.answer_window();
    c.pump();
    assert!(c.rows().slice().is_none());
    assert!(matches!(
        events.borrow().last(),
        Some(GridEvent::StaleDiscarded(_))
    ));

    let query = gateway.answer_window();
    c.pump();
    assert_eq!(query.query.filters[0].operator, FilterOperator::Eq);
    assert!(c.rows().slice().is_some());
}

#[test]
fn setting_the_same_query_is_a_noop() {
    let (mut c, gateway, _clock) = controller(10_000);
    c.set_query(QuerySpec::default());
    assert!(gateway.invalidated.borrow().is_empty());
    assert_eq!(gateway.window_calls.get(), 1);
}

#[test]
fn refresh_total_count_rewindows() {
    let (mut c, gateway, _clock) = controller(10_000);
    let events = record_events(&mut c);
    gateway.total.set(30);

    assert_eq!(block_on(c.refresh_total_count()), Ok(30));
    assert_eq!(c.rows().total_count(), 30);
    assert_eq!(c.rows().rendered_range(), IndexRange::new(0, 30));
    assert!(
        events
            .borrow()
            .contains(&GridEvent::TotalCountChanged(30))
    );

    events.borrow_mut().clear();
    assert_eq!(block_on(c.refresh_total_count()), Ok(30));
    assert!(events.borrow().is_empty());
}

#[test]
fn horizontal_scroll_moves_column_window() {
    let (mut c, _gateway, _clock) = controller(10_000);
    assert_eq!(c.columns().visible_range(), IndexRange::new(0, 6));

    let change = c.on_horizontal_scroll(1200).unwrap();
    assert_eq!(change.axis, Axis::Horizontal);
    assert_eq!(c.columns().visible_range(), IndexRange::new(6, 12));
    assert_eq!(c.columns().rendered_range(), IndexRange::new(1, 15));
}

#[test]
fn column_layout_changes_pass_through() {
    let (mut c, _gateway, _clock) = controller(10_000);

    assert_eq!(
        c.set_column_width("c0", 0),
        Err(ConfigError::ZeroColumnWidth {
            fieldname: "c0".into()
        })
    );
    assert!(c.set_column_width("c0", 400).is_ok());
    assert_eq!(c.columns().regular_width(), 3200);

    let removed = c.remove_column("c3").unwrap();
    assert_eq!(removed.fieldname, "c3");
    assert_eq!(c.columns().regular_count(), 14);
    assert!(c.columns().element("c3").is_none());

    c.pin_column("c1", gridwindow::PinnedSide::Left).unwrap();
    assert_eq!(c.columns().layout().pinned_left().len(), 1);
}

#[test]
fn unsubscribed_listener_stops_receiving() {
    let (mut c, gateway, _clock) = controller(10_000);
    let events = Rc::new(Cell::new(0));
    let counter = Rc::clone(&events);
    let id = c.subscribe(move |_| counter.set(counter.get() + 1));
    assert_eq!(c.listener_count(), 1);

    assert!(c.unsubscribe(id));
    assert!(!c.unsubscribe(id));
    gateway.answer_window();
    c.pump();
    assert_eq!(events.get(), 0);
}

#[test]
fn teardown_releases_everything() {
    let (mut c, _gateway, _clock) = controller(10_000);
    assert!(c.pool().active_len() > 0);

    c.teardown();
    assert_eq!(c.pool().active_len(), 0);
    assert_eq!(c.pending_fetches(), 0);
    assert_eq!(c.rows().rendered_len(), 0);
    assert_eq!(c.columns().rendered_len(), 0);
}

#[test]
fn invalid_options_are_rejected() {
    let gateway = Rc::new(MockGateway::new(10));
    let options = GridOptions::new().with_item_height(0);
    let result: Result<TestController, _> =
        GridController::new(gateway, ManualClock::new(0), options, layout(), 10);
    assert!(matches!(result, Err(ConfigError::ZeroItemHeight)));
}

fn window_query(start: u64, query: QuerySpec) -> WindowQuery {
    WindowQuery {
        viewport_start: start,
        viewport_end: start + 600,
        item_height: 40,
        query,
    }
}

#[test]
fn cache_serves_repeated_windows_until_ttl() {
    let inner = Rc::new(MockGateway::new(10_000));
    let clock = ManualClock::new(0);
    let cache = CachedGateway::new(Rc::clone(&inner), clock.clone(), 1_000);
    let q = window_query(0, QuerySpec::default());

    let first = cache.get_window(&q);
    inner.answer_window();
    assert_eq!(block_on(first).unwrap().buffer_start, 0);

    clock.set(999);
    let hit = cache.get_window(&q).now_or_never().unwrap().unwrap();
    assert_eq!(hit.items.len(), 65);
    assert_eq!(inner.window_calls.get(), 1);
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            entries: 1
        }
    );

    clock.set(1_000);
    let _miss = cache.get_window(&q);
    assert_eq!(inner.window_calls.get(), 2);
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn cache_purges_expired_entries() {
    let inner = Rc::new(MockGateway::new(10_000));
    let clock = ManualClock::new(0);
    let cache = CachedGateway::new(Rc::clone(&inner), clock.clone(), 100);

    for start in [0, 4_000] {
        let fut = cache.get_window(&window_query(start, QuerySpec::default()));
        inner.answer_window();
        block_on(fut).unwrap();
    }
    assert_eq!(cache.purge_expired(), 0);
    clock.advance(100);
    assert_eq!(cache.purge_expired(), 2);
}

#[test]
fn cache_drops_expired_entries_on_miss() {
    let inner = Rc::new(MockGateway::new(100_000));
    let clock = ManualClock::new(0);
    let cache = CachedGateway::new(Rc::clone(&inner), clock.clone(), 1_000);

    for i in 0..50u64 {
        clock.advance(1_000);
        let fut = cache.get_window(&window_query(i * 400, QuerySpec::default()));
        inner.answer_window();
        block_on(fut).unwrap();
    }
    assert_eq!(cache.stats().misses, 50);
    assert_eq!(cache.stats().entries, 1);

    // Fresh entries survive a miss elsewhere.
    let fut = cache.get_window(&window_query(400_000, QuerySpec::default()));
    inner.answer_window();
    block_on(fut).unwrap();
    assert_eq!(cache.stats().entries, 2);
}

#[test]
fn cache_invalidation_is_scoped_to_a_query() {
    let inner = Rc::new(MockGateway::new(10_000));
    let cache = CachedGateway::new(Rc::clone(&inner), ManualClock::new(0), 1_000);
    let open = QuerySpec::new().with_filter(Filter::new("status", FilterOperator::Eq, "Open"));
    let closed = QuerySpec::new().with_filter(Filter::new("status", FilterOperator::Eq, "Closed"));

    for query in [open.clone(), closed] {
        let fut = cache.get_window(&window_query(0, query));
        inner.answer_window();
        block_on(fut).unwrap();
    }
    assert_eq!(cache.stats().entries, 2);

    cache.invalidate_cache(&CacheScope::Query(open.fingerprint()));
    assert_eq!(cache.stats().entries, 1);
    assert_eq!(
        inner.invalidated.borrow().as_slice(),
        &[CacheScope::Query(open.fingerprint())]
    );
}

#[test]
fn response_in_flight_during_invalidation_is_not_cached() {
    let inner = Rc::new(MockGateway::new(10_000));
    let cache = CachedGateway::new(Rc::clone(&inner), ManualClock::new(0), 1_000);

    let fut = cache.get_window(&window_query(0, QuerySpec::default()));
    cache.invalidate_cache(&CacheScope::All);
    inner.answer_window();

    assert!(block_on(fut).is_ok());
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn cache_passes_errors_through_uncached() {
    let inner = Rc::new(MockGateway::new(10_000));
    let cache = CachedGateway::new(Rc::clone(&inner), ManualClock::new(0), 1_000);

    let fut = cache.get_window(&window_query(0, QuerySpec::default()));
    inner.fail_window(FetchError::Unavailable);
    assert_eq!(block_on(fut), Err(FetchError::Unavailable));
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn controller_runs_on_a_cached_gateway() {
    let inner = Rc::new(MockGateway::new(10_000));
    let clock = ManualClock::new(0);
    let options = GridOptions::new().with_viewport(1200, 600);
    let cache = CachedGateway::from_options(Rc::clone(&inner), clock.clone(), &options);
    let mut c: GridController<_, Node, _> =
        GridController::new(cache, clock.clone(), options, layout(), 10_000).unwrap();

    inner.answer_window();
    c.pump();
    c.on_vertical_scroll(40_000);
    inner.answer_window();
    c.pump();

    // Scrolling back to the top is served from the cache.
    clock.set(100);
    c.on_vertical_scroll(0);
    assert_eq!(c.pump(), 1);
    assert_eq!(inner.window_calls.get(), 2);
    assert_eq!(c.rows().record(0), Some(&0));
    assert_eq!(c.gateway().stats().hits, 1);
}

#[test]
fn operators_parse_and_display() {
    assert_eq!("NOT IN".parse::<FilterOperator>(), Ok(FilterOperator::NotIn));
    assert_eq!(" like ".parse::<FilterOperator>(), Ok(FilterOperator::Like));
    assert_eq!(
        "~".parse::<FilterOperator>(),
        Err(ParseOperatorError("~".into()))
    );
    for op in FilterOperator::ALL {
        assert_eq!(op.to_string().parse::<FilterOperator>(), Ok(op));
    }
}

#[test]
fn membership_against_a_single_value_becomes_equality() {
    let f = Filter::new("status", FilterOperator::NotIn, "Closed").normalized();
    assert_eq!(f.operator, FilterOperator::NotEq);

    let list = FilterValue::List(vec!["Open".into(), "Closed".into()]);
    let f = Filter::new("status", FilterOperator::In, list).normalized();
    assert_eq!(f.operator, FilterOperator::In);
}

#[test]
fn fingerprint_tracks_query_content() {
    let a = QuerySpec::new()
        .with_sort(SortSpec::desc("modified"))
        .with_columns(["name", "status"]);
    let b = a.clone();
    assert_eq!(a.fingerprint(), b.fingerprint());

    let c = a.clone().with_sort(SortSpec::asc("modified"));
    assert_ne!(a.fingerprint(), c.fingerprint());

    let d = a.clone().with_filter(Filter::new("qty", FilterOperator::Gt, 5i64));
    assert_ne!(a.fingerprint(), d.fingerprint());
}

#[test]
fn manual_clock_is_shared_between_clones() {
    let clock = ManualClock::new(10);
    let other = clock.clone();
    assert_eq!(clock.advance(5), 15);
    assert_eq!(other.now_ms(), 15);
    other.set(3);
    assert_eq!(clock.now_ms(), 3);
}
