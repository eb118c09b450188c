use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cmp;

use crate::pool::{ElementId, RecyclePool, RenderNode, RenderedElement};
use crate::{
    Axis, ConfigError, ElementKind, FetchError, GridOptions, IndexRange, StaleResponse,
    ViewportState, WindowChange,
};

/// Identifies one data request issued by a [`RowWindow`].
///
/// Tickets increase monotonically; a response carrying an older ticket than the last applied
/// one is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FetchTicket(pub u64);

/// A data slice returned by the gateway.
///
/// `buffer_start` is the logical row index of `items[0]`; the gateway chooses its own buffer,
/// so the slice may be wider or narrower than the window that requested it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSlice<R> {
    pub items: Vec<R>,
    pub buffer_start: usize,
}

impl<R> DataSlice<R> {
    pub fn new(items: Vec<R>, buffer_start: usize) -> Self {
        Self {
            items,
            buffer_start,
        }
    }

    pub fn range(&self) -> IndexRange {
        IndexRange::new(
            self.buffer_start,
            self.buffer_start.saturating_add(self.items.len()),
        )
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        let offset = index.checked_sub(self.buffer_start)?;
        self.items.get(offset)
    }
}

/// A data request for the current row window.
///
/// The request is keyed by pixel viewport rather than by indexes: the gateway computes its own
/// buffered slice. `origin` is the rendered range at request time and is what staleness is
/// judged against when the response comes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowRequest {
    pub ticket: FetchTicket,
    pub origin: IndexRange,
    pub viewport_start: u64,
    pub viewport_end: u64,
    pub item_height: u32,
}

/// The result of [`RowWindow::recompute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowUpdate {
    pub change: WindowChange,
    /// A data request to hand to the gateway, if the held slice does not cover the window.
    pub request: Option<WindowRequest>,
}

/// Vertical virtualization over fixed-height rows.
///
/// The window owns the mapping from row index to pooled element and the last data slice it
/// applied. It never talks to a data source directly: [`RowWindow::recompute`] emits
/// [`WindowRequest`]s and the host feeds responses back through
/// [`RowWindow::apply_response`].
#[derive(Clone, Debug)]
pub struct RowWindow<R> {
    item_height: u32,
    buffer_size: usize,
    total_count: usize,

    viewport: ViewportState,
    visible: IndexRange,
    rendered: IndexRange,
    active: BTreeMap<usize, ElementId>,
    dirty: bool,

    slice: Option<DataSlice<R>>,
    next_ticket: u64,
    // Tickets below this were issued before the last invalidation.
    min_live_ticket: u64,
    applied_ticket: Option<FetchTicket>,
    last_request: Option<WindowRequest>,
    last_error: Option<FetchError>,
}

impl<R> RowWindow<R> {
    pub fn new(options: &GridOptions, total_count: usize) -> Result<Self, ConfigError> {
        if options.item_height == 0 {
            return Err(ConfigError::ZeroItemHeight);
        }
        gdebug!(
            item_height = options.item_height,
            buffer_size = options.buffer_size,
            total_count,
            "RowWindow::new"
        );
        Ok(Self {
            item_height: options.item_height,
            buffer_size: options.buffer_size,
            total_count,
            viewport: ViewportState::new(0, options.viewport_height),
            visible: IndexRange::EMPTY,
            rendered: IndexRange::EMPTY,
            active: BTreeMap::new(),
            dirty: true,
            slice: None,
            next_ticket: 0,
            min_live_ticket: 0,
            applied_ticket: None,
            last_request: None,
            last_error: None,
        })
    }

    pub fn item_height(&self) -> u32 {
        self.item_height
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    /// The visible range computed by the last recompute.
    pub fn visible_range(&self) -> IndexRange {
        self.visible
    }

    /// The rendered (buffered) range computed by the last recompute.
    pub fn rendered_range(&self) -> IndexRange {
        self.rendered
    }

    /// Total virtual content height: `total_count * item_height`.
    pub fn content_height(&self) -> u64 {
        (self.total_count as u64).saturating_mul(self.item_height as u64)
    }

    pub fn max_scroll_offset(&self, viewport_size: u32) -> u64 {
        self.content_height().saturating_sub(viewport_size as u64)
    }

    pub fn set_total_count(&mut self, total_count: usize) {
        if self.total_count == total_count {
            return;
        }
        self.total_count = total_count;
        self.dirty = true;
    }

    pub fn set_item_height(&mut self, item_height: u32) -> Result<(), ConfigError> {
        if item_height == 0 {
            return Err(ConfigError::ZeroItemHeight);
        }
        if self.item_height != item_height {
            self.item_height = item_height;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        if self.buffer_size != buffer_size {
            self.buffer_size = buffer_size;
            self.dirty = true;
        }
    }

    /// Rows intersecting the viewport: `[floor(offset / h), ceil((offset + size) / h))`,
    /// clamped to the row count. Offsets past the end are clamped to the last full page.
    pub fn visible_range_for(&self, viewport: ViewportState) -> IndexRange {
        let count = self.total_count;
        if count == 0 || viewport.viewport_size == 0 {
            return IndexRange::EMPTY;
        }
        let h = self.item_height as u64;
        let offset = cmp::min(
            viewport.scroll_offset,
            self.max_scroll_offset(viewport.viewport_size),
        );
        let end_px = offset.saturating_add(viewport.viewport_size as u64);

        let start = (offset / h) as usize;
        let end = end_px.div_ceil(h) as usize;
        IndexRange::new(start, end).clamp_to(count)
    }

    /// The visible range expanded by `buffer_size` rows on each side, clamped to the row count.
    pub fn buffered_range_for(&self, viewport: ViewportState) -> IndexRange {
        let visible = self.visible_range_for(viewport);
        if visible.is_empty() {
            return visible;
        }
        let start = visible.start.saturating_sub(self.buffer_size);
        let end = cmp::min(
            self.total_count,
            visible.end.saturating_add(self.buffer_size),
        );
        IndexRange { start, end }
    }

    /// Recomputes the window for `viewport` and diffs it against the rendered set.
    ///
    /// Rows that left the buffered range are released to `pool`; rows that entered it are
    /// acquired from `pool` and positioned at `index * item_height`. Calling this twice with
    /// the same viewport does no pool work the second time.
    pub fn recompute<E: RenderNode>(
        &mut self,
        viewport: ViewportState,
        pool: &mut RecyclePool<E>,
    ) -> RowUpdate {
        self.viewport = viewport;
        let visible = self.visible_range_for(viewport);
        let rendered = self.buffered_range_for(viewport);

        let mut change = WindowChange {
            axis: Axis::Vertical,
            visible,
            rendered,
            acquired: 0,
            released: 0,
            repositioned: 0,
        };

        if !self.dirty && rendered == self.rendered {
            self.visible = visible;
            let request = self.next_request();
            return RowUpdate { change, request };
        }

        let leaving: Vec<usize> = self
            .active
            .keys()
            .copied()
            .filter(|&i| !rendered.contains(i))
            .collect();
        for index in leaving {
            if let Some(id) = self.active.remove(&index) {
                pool.release(id);
                change.released += 1;
            }
        }

        let h = self.item_height;
        for index in rendered.iter() {
            let offset = (index as u64).saturating_mul(h as u64);
            let has_data = self.record(index).is_some();
            match self.active.get(&index).copied() {
                Some(id) => {
                    if let Some(el) = pool.get_mut(id) {
                        if el.offset != offset || el.extent != h {
                            el.offset = offset;
                            el.extent = h;
                            change.repositioned += 1;
                        }
                    }
                }
                None => {
                    let id = pool.acquire(ElementKind::Row);
                    if let Some(el) = pool.get_mut(id) {
                        el.index = Some(index);
                        el.offset = offset;
                        el.extent = h;
                        el.stale = !has_data;
                    }
                    self.active.insert(index, id);
                    change.acquired += 1;
                }
            }
        }

        self.visible = visible;
        self.rendered = rendered;
        self.dirty = false;
        debug_assert_eq!(self.active.len(), rendered.len());

        gtrace!(
            start = rendered.start,
            end = rendered.end,
            acquired = change.acquired,
            released = change.released,
            "RowWindow::recompute"
        );

        let request = self.next_request();
        RowUpdate { change, request }
    }

    fn next_request(&mut self) -> Option<WindowRequest> {
        let rendered = self.rendered;
        if rendered.is_empty() {
            return None;
        }
        if self
            .slice
            .as_ref()
            .is_some_and(|s| s.range().covers(rendered))
        {
            return None;
        }
        if self
            .last_request
            .is_some_and(|r| r.ticket.0 >= self.min_live_ticket && r.origin.covers(rendered))
        {
            return None;
        }

        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);
        let start = cmp::min(
            self.viewport.scroll_offset,
            self.max_scroll_offset(self.viewport.viewport_size),
        );
        let request = WindowRequest {
            ticket,
            origin: rendered,
            viewport_start: start,
            viewport_end: start.saturating_add(self.viewport.viewport_size as u64),
            item_height: self.item_height,
        };
        self.last_request = Some(request);
        Some(request)
    }

    /// Applies a gateway response.
    ///
    /// The response is discarded as stale if its origin no longer intersects the rendered
    /// range, if a newer response was already applied, or if it predates the last
    /// [`RowWindow::invalidate`]. On success, returns the number of rendered rows now backed by
    /// data.
    pub fn apply_response<E>(
        &mut self,
        request: &WindowRequest,
        slice: DataSlice<R>,
        pool: &mut RecyclePool<E>,
    ) -> Result<usize, StaleResponse> {
        let stale = request.ticket.0 < self.min_live_ticket
            || !request.origin.intersects(self.rendered)
            || self.applied_ticket.is_some_and(|t| t > request.ticket);
        if stale {
            let err = StaleResponse {
                ticket: request.ticket,
                origin: request.origin,
                current: self.rendered,
            };
            gdebug!(
                ticket = request.ticket.0,
                origin_start = request.origin.start,
                origin_end = request.origin.end,
                current_start = self.rendered.start,
                current_end = self.rendered.end,
                "RowWindow: discarded stale response"
            );
            return Err(err);
        }

        let covered = slice.range();
        self.slice = Some(slice);
        self.applied_ticket = Some(request.ticket);
        self.last_error = None;

        let mut backed = 0usize;
        for (&index, &id) in self.active.iter() {
            if let Some(el) = pool.get_mut(id) {
                el.stale = !covered.contains(index);
                if !el.stale {
                    backed += 1;
                }
            }
        }
        gtrace!(
            ticket = request.ticket.0,
            start = covered.start,
            end = covered.end,
            backed,
            "RowWindow::apply_response"
        );
        Ok(backed)
    }

    /// Records a failed fetch. The last applied slice stays in place.
    ///
    /// Returns the error so the host can surface it.
    pub fn apply_failure(&mut self, request: &WindowRequest, error: FetchError) -> FetchError {
        gwarn!(
            ticket = request.ticket.0,
            error = ?error,
            "RowWindow: data request failed; keeping last slice"
        );
        if self.last_request.is_some_and(|r| r.ticket == request.ticket) {
            self.last_error = Some(error.clone());
        }
        error
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// The last request issued, answered or not.
    pub fn last_request(&self) -> Option<&WindowRequest> {
        self.last_request.as_ref()
    }

    pub fn slice(&self) -> Option<&DataSlice<R>> {
        self.slice.as_ref()
    }

    /// The record for a row, if the applied slice contains it.
    pub fn record(&self, index: usize) -> Option<&R> {
        self.slice.as_ref()?.get(index)
    }

    pub fn element(&self, index: usize) -> Option<ElementId> {
        self.active.get(&index).copied()
    }

    pub fn rendered_len(&self) -> usize {
        self.active.len()
    }

    pub fn rendered_indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.keys().copied()
    }

    /// Visits every rendered row in ascending index order.
    pub fn for_each_rendered<E>(
        &self,
        pool: &RecyclePool<E>,
        mut f: impl FnMut(usize, &RenderedElement<E>, Option<&R>),
    ) {
        for (&index, &id) in self.active.iter() {
            if let Some(el) = pool.get(id) {
                f(index, el, self.record(index));
            }
        }
    }

    /// Fraction of the rendered range consumed by the visible end, in `[0, 1]`.
    pub fn buffer_usage(&self) -> f32 {
        let rendered = self.rendered;
        if rendered.is_empty() {
            return 0.0;
        }
        let used = self.visible.end.saturating_sub(rendered.start);
        used as f32 / rendered.len() as f32
    }

    /// Drops the held slice and marks every rendered row stale.
    ///
    /// Responses to requests issued before this call are discarded. Call this when the query
    /// (filters, sort, columns) changes; the next recompute issues a fresh request.
    pub fn invalidate<E>(&mut self, pool: &mut RecyclePool<E>) {
        self.slice = None;
        self.applied_ticket = None;
        self.last_request = None;
        self.last_error = None;
        self.min_live_ticket = self.next_ticket;
        for &id in self.active.values() {
            if let Some(el) = pool.get_mut(id) {
                el.stale = true;
            }
        }
        gdebug!(min_live_ticket = self.min_live_ticket, "RowWindow::invalidate");
    }

    /// Releases every rendered element and forgets all state except configuration.
    pub fn teardown<E: RenderNode>(&mut self, pool: &mut RecyclePool<E>) {
        for (_, id) in core::mem::take(&mut self.active) {
            pool.release(id);
        }
        self.visible = IndexRange::EMPTY;
        self.rendered = IndexRange::EMPTY;
        self.slice = None;
        self.applied_ticket = None;
        self.last_request = None;
        self.last_error = None;
        self.min_live_ticket = self.next_ticket;
        self.dirty = true;
    }
}
