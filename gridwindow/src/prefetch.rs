use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::columns::CumulativePositions;
use crate::scroll::velocity_metrics;
use crate::{
    Axis, ConfigError, GridOptions, IndexRange, PreloadRange, ScrollDirection, ScrollSample,
};

/// Where the prefetch planner is looking from when scrolling ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatternContext<'a> {
    pub axis: Axis,
    /// The range currently rendered on this axis.
    pub rendered: IndexRange,
    /// Number of items on this axis.
    pub total: usize,
    /// Pixel size of one item: the row height, or the average regular column width.
    pub unit_size: f64,
    /// Exact item spans for variable-size items. When present, pixel positions are mapped
    /// through these instead of `unit_size`.
    pub positions: Option<&'a CumulativePositions>,
}

impl PatternContext<'_> {
    /// Items covering the pixel interval `[offset, offset + length)`.
    ///
    /// Returns `None` when the interval is too short to cover an item.
    fn items_for(&self, offset: u64, length: u64) -> Option<IndexRange> {
        match self.positions {
            Some(positions) => {
                let at = |px: u64| positions.index_at(px).unwrap_or(positions.len());
                let start = at(offset);
                let end = at(offset.saturating_add(length));
                (end > start).then_some(IndexRange::new(start, end))
            }
            None => {
                let start = (offset as f64 / self.unit_size) as usize;
                match (length as f64 / self.unit_size) as usize {
                    0 => None,
                    span => Some(IndexRange::new(start, start.saturating_add(span))),
                }
            }
        }
    }

    fn item_at(&self, offset: u64) -> usize {
        match self.positions {
            Some(positions) => positions.index_at(offset).unwrap_or(positions.len()),
            None => (offset as f64 / self.unit_size) as usize,
        }
    }
}

/// Turns a scroll history into predicted ranges of interest.
pub trait PatternAnalyzer {
    fn analyze(&self, history: &[ScrollSample], context: &PatternContext<'_>) -> Vec<IndexRange>;
}

impl<F> PatternAnalyzer for F
where
    F: Fn(&[ScrollSample], &PatternContext<'_>) -> Vec<IndexRange>,
{
    fn analyze(&self, history: &[ScrollSample], context: &PatternContext<'_>) -> Vec<IndexRange> {
        self(history, context)
    }
}

/// Extrapolates the recent average velocity `lookahead_ms` into the future.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VelocityAnalyzer {
    pub lookahead_ms: u64,
    /// Span used when the predicted distance is shorter than one item.
    pub fallback_span: usize,
}

impl VelocityAnalyzer {
    pub const DEFAULT_LOOKAHEAD_MS: u64 = 2_000;

    pub fn rows() -> Self {
        Self {
            lookahead_ms: Self::DEFAULT_LOOKAHEAD_MS,
            fallback_span: 50,
        }
    }

    pub fn columns() -> Self {
        Self {
            lookahead_ms: Self::DEFAULT_LOOKAHEAD_MS,
            fallback_span: 5,
        }
    }

    pub fn for_axis(axis: Axis) -> Self {
        match axis {
            Axis::Vertical => Self::rows(),
            Axis::Horizontal => Self::columns(),
        }
    }
}

impl Default for VelocityAnalyzer {
    fn default() -> Self {
        Self::rows()
    }
}

impl PatternAnalyzer for VelocityAnalyzer {
    fn analyze(&self, history: &[ScrollSample], context: &PatternContext<'_>) -> Vec<IndexRange> {
        let Some(last) = history.last() else {
            return Vec::new();
        };
        let metrics = velocity_metrics(history.iter().copied());
        let Some(direction) = metrics.direction else {
            return Vec::new();
        };
        if metrics.velocity <= 0.0 {
            return Vec::new();
        }
        if context.positions.is_none() && !(context.unit_size > 0.0) {
            return Vec::new();
        }

        let distance = (metrics.velocity * self.lookahead_ms as f64) as u64;
        let predicted = match direction {
            ScrollDirection::Forward => last.position.saturating_add(distance),
            ScrollDirection::Backward => last.position.saturating_sub(distance),
        };
        let range = context
            .items_for(predicted, distance)
            .unwrap_or_else(|| {
                let start = context.item_at(predicted);
                IndexRange::new(start, start.saturating_add(self.fallback_span))
            })
            .clamp_to(context.total);
        if range.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(1);
        out.push(range);
        out
    }
}

/// Schedules speculative preloads when scrolling ends.
///
/// Predicted ranges are clamped, trimmed against what is already rendered and deduplicated
/// against ranges still queued or in flight. At most `batch_size` ranges are dispatched per
/// cycle; the rest wait in the queue for the next scroll-end. The planner never learns whether
/// a preload succeeded: the caller reports completion with [`PrefetchPlanner::settle`].
#[derive(Clone, Debug)]
pub struct PrefetchPlanner {
    axis: Axis,
    min_samples: usize,
    batch_size: usize,
    queue: VecDeque<IndexRange>,
    in_flight: Vec<IndexRange>,
}

impl PrefetchPlanner {
    pub fn new(axis: Axis, options: &GridOptions) -> Result<Self, ConfigError> {
        if options.prefetch_batch_size == 0 {
            return Err(ConfigError::ZeroPrefetchBatch);
        }
        Ok(Self {
            axis,
            min_samples: options.prefetch_min_samples,
            batch_size: options.prefetch_batch_size,
            queue: VecDeque::new(),
            in_flight: Vec::new(),
        })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn queued(&self) -> impl Iterator<Item = IndexRange> + '_ {
        self.queue.iter().copied()
    }

    pub fn in_flight(&self) -> &[IndexRange] {
        &self.in_flight
    }

    /// Runs one planning cycle. Returns the ranges to hand to the preload capability now.
    pub fn on_scroll_end(
        &mut self,
        history: &[ScrollSample],
        analyzer: &dyn PatternAnalyzer,
        context: &PatternContext<'_>,
    ) -> Vec<PreloadRange> {
        if history.len() < self.min_samples {
            gtrace!(
                samples = history.len(),
                required = self.min_samples,
                "PrefetchPlanner: not enough samples"
            );
            return Vec::new();
        }
        let predicted = analyzer.analyze(history, context);
        self.plan(predicted, context)
    }

    /// Queues `predicted` ranges and dispatches the next batch.
    pub fn plan(
        &mut self,
        predicted: impl IntoIterator<Item = IndexRange>,
        context: &PatternContext<'_>,
    ) -> Vec<PreloadRange> {
        for range in predicted {
            let range = range.clamp_to(context.total);
            for piece in subtract(range, context.rendered) {
                if piece.is_empty() || self.is_known(piece) {
                    continue;
                }
                self.queue.push_back(piece);
            }
        }

        let mut dispatched = Vec::new();
        while dispatched.len() < self.batch_size {
            let Some(range) = self.queue.pop_front() else {
                break;
            };
            self.in_flight.push(range);
            dispatched.push(PreloadRange {
                axis: self.axis,
                range,
            });
        }
        if !dispatched.is_empty() {
            gdebug!(
                axis = ?self.axis,
                dispatched = dispatched.len(),
                queued = self.queue.len(),
                "PrefetchPlanner: dispatching preloads"
            );
        }
        dispatched
    }

    /// Marks a dispatched range as finished. Returns `false` if it was not in flight.
    pub fn settle(&mut self, range: IndexRange) -> bool {
        match self.in_flight.iter().position(|r| *r == range) {
            Some(i) => {
                self.in_flight.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Drops both the queue and the in-flight set, e.g. after the query changed.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.in_flight.clear();
    }

    fn is_known(&self, range: IndexRange) -> bool {
        self.queue
            .iter()
            .chain(self.in_flight.iter())
            .any(|known| known.covers(range))
    }
}

/// The parts of `range` outside `covered`.
fn subtract(range: IndexRange, covered: IndexRange) -> [IndexRange; 2] {
    if !range.intersects(covered) {
        return [range, IndexRange::EMPTY];
    }
    [
        IndexRange::new(range.start, covered.start.min(range.end)),
        IndexRange::new(covered.end.max(range.start), range.end),
    ]
}

/// Ranges to preload once the visible end has used up more than `threshold` of the rendered
/// buffer: the next block after the buffer, and above 90% usage the block after that too.
pub fn threshold_ranges(
    visible: IndexRange,
    rendered: IndexRange,
    total: usize,
    threshold: f32,
    buffer_size: usize,
) -> Vec<IndexRange> {
    let mut out = Vec::new();
    if rendered.is_empty() {
        return out;
    }
    let usage = visible.end.saturating_sub(rendered.start) as f32 / rendered.len() as f32;
    if usage <= threshold {
        return out;
    }

    let next_start = rendered.end;
    let next_end = next_start
        .saturating_add(visible.len())
        .saturating_add(buffer_size)
        .min(total);
    if next_start < total {
        out.push(IndexRange::new(next_start, next_end));
    }
    if usage > 0.9 {
        let far_end = next_end.saturating_add(visible.len()).min(total);
        if next_end < total {
            out.push(IndexRange::new(next_end, far_end));
        }
    }
    out
}
