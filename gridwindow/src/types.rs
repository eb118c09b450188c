use core::cmp;

/// The scroll axis a window, tracker or prefetch range belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// Rows (scrolling along the y axis).
    Vertical,
    /// Columns (scrolling along the x axis).
    Horizontal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    Forward,
    Backward,
}

/// A half-open range of logical indexes (`start..end`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexRange {
    pub start: usize,
    pub end: usize, // exclusive
}

impl IndexRange {
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: cmp::max(start, end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    ///
    /// An empty `other` is covered by any range.
    pub fn covers(&self, other: IndexRange) -> bool {
        other.is_empty() || (other.start >= self.start && other.end <= self.end)
    }

    pub fn intersects(&self, other: IndexRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    pub fn intersection(&self, other: IndexRange) -> IndexRange {
        let start = cmp::max(self.start, other.start);
        let end = cmp::min(self.end, other.end);
        if start >= end {
            return IndexRange::EMPTY;
        }
        IndexRange { start, end }
    }

    /// Clamps the range to `[0, count)`.
    pub fn clamp_to(&self, count: usize) -> IndexRange {
        let end = cmp::min(self.end, count);
        let start = cmp::min(self.start, end);
        IndexRange { start, end }
    }

    pub fn iter(&self) -> core::ops::Range<usize> {
        self.start..self.end
    }
}

impl From<core::ops::Range<usize>> for IndexRange {
    fn from(r: core::ops::Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

/// A timestamped scroll position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollSample {
    pub position: u64,
    pub timestamp_ms: u64,
}

impl ScrollSample {
    pub fn new(position: u64, timestamp_ms: u64) -> Self {
        Self {
            position,
            timestamp_ms,
        }
    }
}

/// A speculative range to load ahead of the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreloadRange {
    pub axis: Axis,
    pub range: IndexRange,
}

/// What a pooled element is used for. Free lists are kept per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementKind {
    Row,
    Column,
}

/// The outcome of a window recomputation along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowChange {
    pub axis: Axis,
    /// Indexes strictly required by the viewport.
    pub visible: IndexRange,
    /// `visible` expanded by the buffer and clamped to the item count.
    pub rendered: IndexRange,
    pub acquired: usize,
    pub released: usize,
    /// Kept elements whose position changed (e.g. after a column resize).
    pub repositioned: usize,
}

impl WindowChange {
    /// Returns `true` if the recomputation touched no element.
    pub fn is_noop(&self) -> bool {
        self.acquired == 0 && self.released == 0 && self.repositioned == 0
    }
}
