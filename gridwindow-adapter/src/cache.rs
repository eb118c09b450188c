use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use gridwindow::{
    DataSlice, FetchError, GridOptions, IndexRange, PatternContext, PreloadRange, ScrollSample,
};

use crate::{CacheScope, Clock, DataFetchGateway, Filter, QuerySpec, WindowQuery};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    fingerprint: u64,
    viewport_start: u64,
    viewport_end: u64,
    item_height: u32,
}

impl CacheKey {
    fn of(query: &WindowQuery) -> Self {
        Self {
            fingerprint: query.query.fingerprint(),
            viewport_start: query.viewport_start,
            viewport_end: query.viewport_end,
            item_height: query.item_height,
        }
    }
}

struct CacheEntry<R> {
    slice: DataSlice<R>,
    expires_at: u64,
}

struct CacheState<R> {
    entries: HashMap<CacheKey, CacheEntry<R>>,
    hits: u64,
    misses: u64,
    // Bumped on invalidation so responses already in flight are not stored.
    generation: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// A [`DataFetchGateway`] wrapper that remembers window responses for `ttl_ms`.
///
/// Entries are keyed by query fingerprint and requested viewport. Their lifetime starts when the
/// request is issued, and expired entries are dropped whenever a request misses. Total counts
/// and preloads are passed through.
pub struct CachedGateway<G: DataFetchGateway, C> {
    inner: G,
    clock: C,
    ttl_ms: u64,
    state: Rc<RefCell<CacheState<G::Record>>>,
}

impl<G, C> CachedGateway<G, C>
where
    G: DataFetchGateway,
    G::Record: Clone,
    C: Clock,
{
    pub fn new(inner: G, clock: C, ttl_ms: u64) -> Self {
        Self {
            inner,
            clock,
            ttl_ms,
            state: Rc::new(RefCell::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                generation: 0,
            })),
        }
    }

    pub fn from_options(inner: G, clock: C, options: &GridOptions) -> Self {
        Self::new(inner, clock, options.cache_ttl_ms)
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.borrow();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut state = self.state.borrow_mut();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.expires_at > now);
        before - state.entries.len()
    }
}

impl<G, C> DataFetchGateway for CachedGateway<G, C>
where
    G: DataFetchGateway,
    G::Record: Clone,
    C: Clock,
{
    type Record = G::Record;

    fn get_total_count(
        &self,
        filters: &[Filter],
    ) -> LocalBoxFuture<'static, Result<usize, FetchError>> {
        self.inner.get_total_count(filters)
    }

    fn get_window(
        &self,
        query: &WindowQuery,
    ) -> LocalBoxFuture<'static, Result<DataSlice<Self::Record>, FetchError>> {
        let now = self.clock.now_ms();
        let key = CacheKey::of(query);

        let generation = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let fresh = state
                .entries
                .get(&key)
                .filter(|entry| entry.expires_at > now)
                .map(|entry| entry.slice.clone());
            if let Some(slice) = fresh {
                state.hits += 1;
                gtrace!(
                    viewport_start = key.viewport_start,
                    viewport_end = key.viewport_end,
                    "CachedGateway: hit"
                );
                return future::ready(Ok(slice)).boxed_local();
            }
            // Every expired entry goes, not just this key.
            state.entries.retain(|_, entry| entry.expires_at > now);
            state.misses += 1;
            state.generation
        };

        let expires_at = now.saturating_add(self.ttl_ms);
        let shared = Rc::clone(&self.state);
        let fetch = self.inner.get_window(query);
        async move {
            let slice = fetch.await?;
            let mut state = shared.borrow_mut();
            if state.generation == generation {
                state.entries.insert(
                    key,
                    CacheEntry {
                        slice: slice.clone(),
                        expires_at,
                    },
                );
            }
            Ok(slice)
        }
        .boxed_local()
    }

    fn preload(
        &self,
        ranges: &[PreloadRange],
        query: &QuerySpec,
    ) -> LocalBoxFuture<'static, Result<(), FetchError>> {
        self.inner.preload(ranges, query)
    }

    fn analyze_scroll_pattern(
        &self,
        history: &[ScrollSample],
        context: &PatternContext<'_>,
    ) -> Vec<IndexRange> {
        self.inner.analyze_scroll_pattern(history, context)
    }

    fn invalidate_cache(&self, scope: &CacheScope) {
        {
            let mut state = self.state.borrow_mut();
            match scope {
                CacheScope::All => state.entries.clear(),
                CacheScope::Query(fingerprint) => {
                    state.entries.retain(|key, _| key.fingerprint != *fingerprint)
                }
            }
            state.generation = state.generation.wrapping_add(1);
            gdebug!(scope = ?scope, remaining = state.entries.len(), "CachedGateway: invalidated");
        }
        self.inner.invalidate_cache(scope);
    }
}
