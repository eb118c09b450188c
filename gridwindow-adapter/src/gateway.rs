use std::rc::Rc;

use futures::future::LocalBoxFuture;
use gridwindow::{
    DataSlice, FetchError, IndexRange, PatternAnalyzer, PatternContext, PreloadRange,
    ScrollSample, VelocityAnalyzer, WindowRequest,
};

use crate::{Filter, QuerySpec};

/// A window data request as seen by the data source.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowQuery {
    pub viewport_start: u64,
    pub viewport_end: u64,
    pub item_height: u32,
    pub query: QuerySpec,
}

impl WindowQuery {
    pub fn from_request(request: &WindowRequest, query: &QuerySpec) -> Self {
        Self {
            viewport_start: request.viewport_start,
            viewport_end: request.viewport_end,
            item_height: request.item_height,
            query: query.clone(),
        }
    }
}

/// Which cached responses to drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheScope {
    All,
    /// Responses for the query with this [`QuerySpec::fingerprint`].
    Query(u64),
}

/// The data source behind a grid.
///
/// Every call returns a `'static` future so the controller can keep requests in flight while
/// scroll events continue to arrive. Futures are polled on the host's event loop thread and need
/// not be `Send`.
pub trait DataFetchGateway {
    type Record: 'static;

    fn get_total_count(
        &self,
        filters: &[Filter],
    ) -> LocalBoxFuture<'static, Result<usize, FetchError>>;

    /// Returns a slice covering at least `[viewport_start, viewport_end)`, buffered as the source
    /// sees fit. `DataSlice::buffer_start` is the row index of the first item.
    fn get_window(
        &self,
        query: &WindowQuery,
    ) -> LocalBoxFuture<'static, Result<DataSlice<Self::Record>, FetchError>>;

    /// Best-effort warm-up of ranges the user is likely to reach. Never retried.
    fn preload(
        &self,
        ranges: &[PreloadRange],
        query: &QuerySpec,
    ) -> LocalBoxFuture<'static, Result<(), FetchError>>;

    fn analyze_scroll_pattern(
        &self,
        history: &[ScrollSample],
        context: &PatternContext<'_>,
    ) -> Vec<IndexRange> {
        VelocityAnalyzer::for_axis(context.axis).analyze(history, context)
    }

    fn invalidate_cache(&self, _scope: &CacheScope) {}
}

impl<G: DataFetchGateway + ?Sized> DataFetchGateway for Rc<G> {
    type Record = G::Record;

    fn get_total_count(
        &self,
        filters: &[Filter],
    ) -> LocalBoxFuture<'static, Result<usize, FetchError>> {
        (**self).get_total_count(filters)
    }

    fn get_window(
        &self,
        query: &WindowQuery,
    ) -> LocalBoxFuture<'static, Result<DataSlice<Self::Record>, FetchError>> {
        (**self).get_window(query)
    }

    fn preload(
        &self,
        ranges: &[PreloadRange],
        query: &QuerySpec,
    ) -> LocalBoxFuture<'static, Result<(), FetchError>> {
        (**self).preload(ranges, query)
    }

    fn analyze_scroll_pattern(
        &self,
        history: &[ScrollSample],
        context: &PatternContext<'_>,
    ) -> Vec<IndexRange> {
        (**self).analyze_scroll_pattern(history, context)
    }

    fn invalidate_cache(&self, scope: &CacheScope) {
        (**self).invalidate_cache(scope)
    }
}
