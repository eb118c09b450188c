use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp;

use crate::pool::{ElementId, RecyclePool, RenderNode, RenderedElement};
use crate::{
    Axis, ConfigError, ElementKind, GridOptions, IndexRange, LayoutInconsistency, ViewportState,
    WindowChange,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinnedSide {
    #[default]
    None,
    Left,
    Right,
}

impl PinnedSide {
    fn rank(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::None => 1,
            Self::Right => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnDescriptor {
    /// Unique within a layout.
    pub fieldname: String,
    /// Width in pixels. Must be greater than zero.
    pub width: u32,
    pub pinned: PinnedSide,
    /// Position within the column's group.
    pub order: i32,
}

impl ColumnDescriptor {
    pub fn new(fieldname: impl Into<String>, width: u32) -> Self {
        Self {
            fieldname: fieldname.into(),
            width,
            pinned: PinnedSide::None,
            order: 0,
        }
    }

    pub fn with_pinned(mut self, pinned: PinnedSide) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

/// An ordered set of columns split into pinned-left, regular and pinned-right groups.
///
/// Columns are stored in display order: every pinned-left column, then every regular column,
/// then every pinned-right column, each group sorted by `order`.
///
/// With the `serde` feature a layout (de)serializes as its column list, and deserializing goes
/// through [`ColumnLayout::new`], so invalid column lists are rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<ColumnDescriptor>", into = "Vec<ColumnDescriptor>")
)]
pub struct ColumnLayout {
    columns: Vec<ColumnDescriptor>,
    left_len: usize,
    right_len: usize,
    version: u64,
}

impl ColumnLayout {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for c in &columns {
            if c.width == 0 {
                return Err(ConfigError::ZeroColumnWidth {
                    fieldname: c.fieldname.clone(),
                });
            }
            if !seen.insert(c.fieldname.as_str()) {
                return Err(ConfigError::DuplicateColumn {
                    fieldname: c.fieldname.clone(),
                });
            }
        }
        let mut layout = Self {
            columns,
            left_len: 0,
            right_len: 0,
            version: 0,
        };
        layout.normalize();
        Ok(layout)
    }

    /// Bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in display order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn pinned_left(&self) -> &[ColumnDescriptor] {
        &self.columns[..self.left_len]
    }

    pub fn regular(&self) -> &[ColumnDescriptor] {
        &self.columns[self.left_len..self.columns.len() - self.right_len]
    }

    pub fn pinned_right(&self) -> &[ColumnDescriptor] {
        &self.columns[self.columns.len() - self.right_len..]
    }

    pub fn get(&self, fieldname: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.fieldname == fieldname)
    }

    /// Display index of a column.
    pub fn position_of(&self, fieldname: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.fieldname == fieldname)
    }

    pub fn fieldnames(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.fieldname.as_str())
    }

    pub fn set_width(&mut self, fieldname: &str, width: u32) -> Result<(), ConfigError> {
        if width == 0 {
            return Err(ConfigError::ZeroColumnWidth {
                fieldname: fieldname.into(),
            });
        }
        let column = self.find_mut(fieldname)?;
        column.width = width;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Moves a column to `position` within its own group (clamped to the group length).
    pub fn move_column(&mut self, fieldname: &str, position: usize) -> Result<(), ConfigError> {
        let from = self.index_of(fieldname)?;
        let side = self.columns[from].pinned;
        let mut group: Vec<ColumnDescriptor> = Vec::new();
        let mut rest: Vec<ColumnDescriptor> = Vec::new();
        let mut moved = None;
        for c in self.columns.drain(..) {
            if c.fieldname == fieldname {
                moved = Some(c);
            } else if c.pinned == side {
                group.push(c);
            } else {
                rest.push(c);
            }
        }
        let Some(moved) = moved else {
            return Err(ConfigError::UnknownColumn {
                fieldname: fieldname.into(),
            });
        };
        let position = cmp::min(position, group.len());
        group.insert(position, moved);
        for (i, c) in group.iter_mut().enumerate() {
            c.order = i as i32;
        }
        rest.extend(group);
        self.columns = rest;
        self.normalize();
        Ok(())
    }

    /// Moves a column into another group, appending it at the group's end.
    pub fn pin(&mut self, fieldname: &str, side: PinnedSide) -> Result<(), ConfigError> {
        let index = self.index_of(fieldname)?;
        if self.columns[index].pinned == side {
            return Ok(());
        }
        let next_order = self
            .columns
            .iter()
            .filter(|c| c.pinned == side)
            .map(|c| c.order)
            .max()
            .map_or(0, |o| o.saturating_add(1));
        let column = &mut self.columns[index];
        column.pinned = side;
        column.order = next_order;
        self.normalize();
        Ok(())
    }

    pub fn insert(&mut self, column: ColumnDescriptor) -> Result<(), ConfigError> {
        if column.width == 0 {
            return Err(ConfigError::ZeroColumnWidth {
                fieldname: column.fieldname,
            });
        }
        if self.get(&column.fieldname).is_some() {
            return Err(ConfigError::DuplicateColumn {
                fieldname: column.fieldname,
            });
        }
        self.columns.push(column);
        self.normalize();
        Ok(())
    }

    pub fn remove(&mut self, fieldname: &str) -> Result<ColumnDescriptor, ConfigError> {
        let index = self.index_of(fieldname)?;
        let removed = self.columns.remove(index);
        self.normalize();
        Ok(removed)
    }

    pub fn pinned_left_width(&self) -> u64 {
        sum_widths(self.pinned_left())
    }

    pub fn pinned_right_width(&self) -> u64 {
        sum_widths(self.pinned_right())
    }

    fn index_of(&self, fieldname: &str) -> Result<usize, ConfigError> {
        self.position_of(fieldname)
            .ok_or_else(|| ConfigError::UnknownColumn {
                fieldname: fieldname.into(),
            })
    }

    fn find_mut(&mut self, fieldname: &str) -> Result<&mut ColumnDescriptor, ConfigError> {
        self.columns
            .iter_mut()
            .find(|c| c.fieldname == fieldname)
            .ok_or_else(|| ConfigError::UnknownColumn {
                fieldname: fieldname.into(),
            })
    }

    fn normalize(&mut self) {
        // Stable: equal orders keep their relative position.
        self.columns
            .sort_by_key(|c| (c.pinned.rank(), c.order));
        self.left_len = self
            .columns
            .iter()
            .filter(|c| c.pinned == PinnedSide::Left)
            .count();
        self.right_len = self
            .columns
            .iter()
            .filter(|c| c.pinned == PinnedSide::Right)
            .count();
        self.version = self.version.wrapping_add(1);
    }
}

impl TryFrom<Vec<ColumnDescriptor>> for ColumnLayout {
    type Error = ConfigError;

    fn try_from(columns: Vec<ColumnDescriptor>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<ColumnLayout> for Vec<ColumnDescriptor> {
    fn from(layout: ColumnLayout) -> Self {
        layout.columns
    }
}

fn sum_widths(columns: &[ColumnDescriptor]) -> u64 {
    columns
        .iter()
        .fold(0u64, |acc, c| acc.saturating_add(c.width as u64))
}

/// A column's horizontal extent: `[left, right)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnSpan {
    pub left: u64,
    pub right: u64,
}

impl ColumnSpan {
    pub fn width(&self) -> u64 {
        self.right.saturating_sub(self.left)
    }
}

/// Prefix sums of column widths, in layout order.
///
/// Invariants: `right[i] == left[i] + width[i]`, `left[i + 1] == right[i]`, and the total
/// width equals `right[last]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CumulativePositions {
    spans: Vec<ColumnSpan>,
}

impl CumulativePositions {
    pub fn from_widths(widths: impl IntoIterator<Item = u32>) -> Self {
        let mut left = 0u64;
        let spans = widths
            .into_iter()
            .map(|w| {
                let right = left.saturating_add(w as u64);
                let span = ColumnSpan { left, right };
                left = right;
                span
            })
            .collect();
        Self { spans }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[ColumnSpan] {
        &self.spans
    }

    pub fn span(&self, index: usize) -> Option<ColumnSpan> {
        self.spans.get(index).copied()
    }

    pub fn total_width(&self) -> u64 {
        self.spans.last().map_or(0, |s| s.right)
    }

    /// The column whose span contains `offset`, if any.
    pub fn index_at(&self, offset: u64) -> Option<usize> {
        let i = self.spans.partition_point(|s| s.right <= offset);
        (i < self.spans.len()).then_some(i)
    }

    /// Columns whose span intersects `[offset, offset + size)`.
    pub fn range_for(&self, offset: u64, size: u64) -> IndexRange {
        if size == 0 || self.spans.is_empty() {
            return IndexRange::EMPTY;
        }
        let end_px = offset.saturating_add(size);
        let start = self.spans.partition_point(|s| s.right <= offset);
        let end = self.spans.partition_point(|s| s.left < end_px);
        IndexRange::new(start, end)
    }

    /// Checks the spans against declared widths.
    pub fn verify(&self, widths: &[u32]) -> Result<(), LayoutInconsistency> {
        let mut expected_left = 0u64;
        for (index, (span, &declared)) in self.spans.iter().zip(widths).enumerate() {
            if span.left != expected_left || span.width() != declared as u64 {
                return Err(LayoutInconsistency {
                    index,
                    declared,
                    actual: span.width(),
                });
            }
            expected_left = span.right;
        }
        if self.spans.len() != widths.len() {
            let index = cmp::min(self.spans.len(), widths.len());
            return Err(LayoutInconsistency {
                index,
                declared: widths.get(index).copied().unwrap_or(0),
                actual: self.span(index).map_or(0, |s| s.width()),
            });
        }
        Ok(())
    }
}

/// Where a rendered column sits.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnPlacement {
    pub fieldname: String,
    pub side: PinnedSide,
    /// Index in display order (pinned-left, regular, pinned-right).
    pub display_index: usize,
    /// Regular columns: content x. Pinned-left: offset from the viewport's left edge.
    /// Pinned-right: offset from the start of the right pinned strip.
    pub offset: u64,
    pub width: u32,
}

/// Layout figures for positioning the regular column container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderingInfo {
    /// Sum of widths of the rendered regular columns.
    pub total_buffered_width: u64,
    /// How much of the rendered regular columns intersects the scrollable viewport.
    pub visible_width: u64,
    /// Content x of the first rendered regular column.
    pub left_offset: u64,
    /// `(regular index, x relative to left_offset)` per rendered regular column.
    pub column_offsets: Vec<(usize, u64)>,
}

/// Horizontal virtualization over variable-width columns with pinned edges.
///
/// Regular columns scroll inside the area between the two pinned strips and are windowed by
/// index; pinned columns are always rendered.
#[derive(Clone, Debug)]
pub struct ColumnWindow {
    layout: ColumnLayout,
    positions: CumulativePositions,
    pinned_left_spans: CumulativePositions,
    pinned_right_spans: CumulativePositions,
    buffer_columns: usize,
    virtualization_ratio: f32,

    viewport: ViewportState,
    visible: IndexRange,
    rendered: IndexRange,
    active: BTreeMap<String, ElementId>,
    dirty: bool,
}

impl ColumnWindow {
    pub fn new(options: &GridOptions, layout: ColumnLayout) -> Result<Self, ConfigError> {
        let ratio = options.column_virtualization_ratio;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(ConfigError::InvalidVirtualizationRatio(ratio));
        }
        let mut window = Self {
            layout,
            positions: CumulativePositions::default(),
            pinned_left_spans: CumulativePositions::default(),
            pinned_right_spans: CumulativePositions::default(),
            buffer_columns: options.buffer_columns,
            virtualization_ratio: ratio,
            viewport: ViewportState::new(0, options.viewport_width),
            visible: IndexRange::EMPTY,
            rendered: IndexRange::EMPTY,
            active: BTreeMap::new(),
            dirty: true,
        };
        window.rebuild_positions();
        Ok(window)
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn positions(&self) -> &CumulativePositions {
        &self.positions
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn visible_range(&self) -> IndexRange {
        self.visible
    }

    /// Rendered regular columns (pinned columns are always rendered in addition).
    pub fn rendered_range(&self) -> IndexRange {
        self.rendered
    }

    pub fn buffer_columns(&self) -> usize {
        self.buffer_columns
    }

    pub fn set_buffer_columns(&mut self, buffer_columns: usize) {
        if self.buffer_columns != buffer_columns {
            self.buffer_columns = buffer_columns;
            self.dirty = true;
        }
    }

    pub fn regular_count(&self) -> usize {
        self.positions.len()
    }

    pub fn regular_width(&self) -> u64 {
        self.positions.total_width()
    }

    /// Total content width: pinned strips plus every regular column.
    pub fn content_width(&self) -> u64 {
        self.layout
            .pinned_left_width()
            .saturating_add(self.regular_width())
            .saturating_add(self.layout.pinned_right_width())
    }

    /// Width available to regular columns once both pinned strips are placed.
    pub fn scrollable_width(&self, viewport_width: u32) -> u64 {
        (viewport_width as u64)
            .saturating_sub(self.layout.pinned_left_width())
            .saturating_sub(self.layout.pinned_right_width())
    }

    pub fn max_scroll_offset(&self, viewport_width: u32) -> u64 {
        self.regular_width()
            .saturating_sub(self.scrollable_width(viewport_width))
    }

    /// Where the right pinned strip starts, measured from the viewport's left edge.
    pub fn pinned_right_origin(&self, viewport_width: u32) -> u64 {
        (viewport_width as u64).saturating_sub(self.layout.pinned_right_width())
    }

    /// Column virtualization only pays off when regular columns are much wider than the
    /// viewport.
    pub fn should_virtualize(&self, viewport_width: u32) -> bool {
        if viewport_width == 0 {
            return false;
        }
        let threshold = viewport_width as f64 * self.virtualization_ratio as f64;
        self.regular_width() as f64 > threshold
    }

    /// Regular columns intersecting the scrollable viewport.
    pub fn visible_range_for(&self, viewport: ViewportState) -> IndexRange {
        let size = self.scrollable_width(viewport.viewport_size);
        if size == 0 || self.positions.is_empty() {
            return IndexRange::EMPTY;
        }
        let offset = cmp::min(
            viewport.scroll_offset,
            self.max_scroll_offset(viewport.viewport_size),
        );
        self.positions.range_for(offset, size)
    }

    /// Regular columns to render: the visible range expanded by `buffer_columns` on each side,
    /// or every regular column when virtualization is not worthwhile.
    pub fn buffered_range_for(&self, viewport: ViewportState) -> IndexRange {
        let count = self.regular_count();
        if !self.should_virtualize(viewport.viewport_size) {
            return IndexRange::new(0, count);
        }
        let visible = self.visible_range_for(viewport);
        if visible.is_empty() {
            return visible;
        }
        IndexRange {
            start: visible.start.saturating_sub(self.buffer_columns),
            end: cmp::min(count, visible.end.saturating_add(self.buffer_columns)),
        }
    }

    /// Recomputes the rendered set and diffs it against the active elements.
    pub fn recompute<E: RenderNode>(
        &mut self,
        viewport: ViewportState,
        pool: &mut RecyclePool<E>,
    ) -> WindowChange {
        if let Err(err) = self.check_layout() {
            debug_assert!(false, "{err}");
            gwarn!(error = %err, "ColumnWindow: repairing cumulative positions");
            self.rebuild_positions();
        }

        self.viewport = viewport;
        let visible = self.visible_range_for(viewport);
        let rendered = self.buffered_range_for(viewport);
        let mut change = WindowChange {
            axis: Axis::Horizontal,
            visible,
            rendered,
            acquired: 0,
            released: 0,
            repositioned: 0,
        };
        self.visible = visible;
        if !self.dirty && rendered == self.rendered {
            return change;
        }

        let placements = self.placements_for(rendered);
        let wanted: BTreeSet<&str> = placements.iter().map(|p| p.fieldname.as_str()).collect();
        let leaving: Vec<String> = self
            .active
            .keys()
            .filter(|k| !wanted.contains(k.as_str()))
            .cloned()
            .collect();
        for name in leaving {
            if let Some(id) = self.active.remove(&name) {
                pool.release(id);
                change.released += 1;
            }
        }

        for p in &placements {
            match self.active.get(&p.fieldname).copied() {
                Some(id) => {
                    if let Some(el) = pool.get_mut(id) {
                        if el.offset != p.offset
                            || el.extent != p.width
                            || el.index != Some(p.display_index)
                        {
                            el.offset = p.offset;
                            el.extent = p.width;
                            el.index = Some(p.display_index);
                            change.repositioned += 1;
                        }
                    }
                }
                None => {
                    let id = pool.acquire(ElementKind::Column);
                    if let Some(el) = pool.get_mut(id) {
                        el.index = Some(p.display_index);
                        el.offset = p.offset;
                        el.extent = p.width;
                        el.stale = false;
                    }
                    self.active.insert(p.fieldname.clone(), id);
                    change.acquired += 1;
                }
            }
        }

        self.rendered = rendered;
        self.dirty = false;
        gtrace!(
            start = rendered.start,
            end = rendered.end,
            acquired = change.acquired,
            released = change.released,
            repositioned = change.repositioned,
            "ColumnWindow::recompute"
        );
        change
    }

    /// Placements of every column that should be rendered for the current viewport.
    pub fn placements(&self) -> Vec<ColumnPlacement> {
        self.placements_for(self.rendered)
    }

    fn placements_for(&self, rendered: IndexRange) -> Vec<ColumnPlacement> {
        let left = self.layout.pinned_left();
        let regular = self.layout.regular();
        let right = self.layout.pinned_right();
        let mut out = Vec::with_capacity(left.len() + rendered.len() + right.len());

        for (i, (c, span)) in left.iter().zip(self.pinned_left_spans.spans()).enumerate() {
            out.push(ColumnPlacement {
                fieldname: c.fieldname.clone(),
                side: PinnedSide::Left,
                display_index: i,
                offset: span.left,
                width: c.width,
            });
        }
        for i in rendered.clamp_to(regular.len()).iter() {
            let c = &regular[i];
            let offset = self.positions.span(i).map_or(0, |s| s.left);
            out.push(ColumnPlacement {
                fieldname: c.fieldname.clone(),
                side: PinnedSide::None,
                display_index: left.len() + i,
                offset,
                width: c.width,
            });
        }
        let base = left.len() + regular.len();
        for (i, (c, span)) in right.iter().zip(self.pinned_right_spans.spans()).enumerate() {
            out.push(ColumnPlacement {
                fieldname: c.fieldname.clone(),
                side: PinnedSide::Right,
                display_index: base + i,
                offset: span.left,
                width: c.width,
            });
        }
        out
    }

    pub fn element(&self, fieldname: &str) -> Option<ElementId> {
        self.active.get(fieldname).copied()
    }

    pub fn rendered_len(&self) -> usize {
        self.active.len()
    }

    /// Visits every rendered column in fieldname order.
    pub fn for_each_rendered<E>(
        &self,
        pool: &RecyclePool<E>,
        mut f: impl FnMut(&str, &RenderedElement<E>),
    ) {
        for (name, &id) in self.active.iter() {
            if let Some(el) = pool.get(id) {
                f(name, el);
            }
        }
    }

    /// Fieldnames of every rendered column, in display order.
    pub fn rendered_fieldnames(&self) -> Vec<&str> {
        self.layout
            .fieldnames()
            .filter(|name| self.active.contains_key(*name))
            .collect()
    }

    pub fn rendering_info(&self) -> RenderingInfo {
        let rendered = self.rendered.clamp_to(self.regular_count());
        let mut info = RenderingInfo::default();
        let Some(first) = self.positions.span(rendered.start).filter(|_| !rendered.is_empty())
        else {
            return info;
        };
        info.left_offset = first.left;

        let size = self.scrollable_width(self.viewport.viewport_size);
        let view_left = cmp::min(
            self.viewport.scroll_offset,
            self.max_scroll_offset(self.viewport.viewport_size),
        );
        let view_right = view_left.saturating_add(size);

        for i in rendered.iter() {
            let Some(span) = self.positions.span(i) else {
                continue;
            };
            info.total_buffered_width = info.total_buffered_width.saturating_add(span.width());
            let lo = cmp::max(span.left, view_left);
            let hi = cmp::min(span.right, view_right);
            if hi > lo {
                info.visible_width += hi - lo;
            }
            info.column_offsets.push((i, span.left - first.left));
        }
        info
    }

    /// Verifies cumulative positions against the declared widths of the regular columns.
    pub fn check_layout(&self) -> Result<(), LayoutInconsistency> {
        let widths: Vec<u32> = self.layout.regular().iter().map(|c| c.width).collect();
        self.positions.verify(&widths)
    }

    /// Replaces the whole layout.
    pub fn set_layout(&mut self, layout: ColumnLayout) {
        self.layout = layout;
        self.rebuild_positions();
    }

    pub fn set_width(&mut self, fieldname: &str, width: u32) -> Result<(), ConfigError> {
        self.layout.set_width(fieldname, width)?;
        self.rebuild_positions();
        Ok(())
    }

    pub fn move_column(&mut self, fieldname: &str, position: usize) -> Result<(), ConfigError> {
        self.layout.move_column(fieldname, position)?;
        self.rebuild_positions();
        Ok(())
    }

    pub fn pin(&mut self, fieldname: &str, side: PinnedSide) -> Result<(), ConfigError> {
        self.layout.pin(fieldname, side)?;
        self.rebuild_positions();
        Ok(())
    }

    pub fn insert_column(&mut self, column: ColumnDescriptor) -> Result<(), ConfigError> {
        self.layout.insert(column)?;
        self.rebuild_positions();
        Ok(())
    }

    pub fn remove_column(&mut self, fieldname: &str) -> Result<ColumnDescriptor, ConfigError> {
        let removed = self.layout.remove(fieldname)?;
        self.rebuild_positions();
        Ok(removed)
    }

    /// Releases every rendered column.
    pub fn teardown<E: RenderNode>(&mut self, pool: &mut RecyclePool<E>) {
        for (_, id) in core::mem::take(&mut self.active) {
            pool.release(id);
        }
        self.visible = IndexRange::EMPTY;
        self.rendered = IndexRange::EMPTY;
        self.dirty = true;
    }

    fn rebuild_positions(&mut self) {
        self.positions =
            CumulativePositions::from_widths(self.layout.regular().iter().map(|c| c.width));
        self.pinned_left_spans =
            CumulativePositions::from_widths(self.layout.pinned_left().iter().map(|c| c.width));
        self.pinned_right_spans =
            CumulativePositions::from_widths(self.layout.pinned_right().iter().map(|c| c.width));
        self.dirty = true;
        gdebug!(
            version = self.layout.version(),
            regular = self.positions.len(),
            total_width = self.positions.total_width(),
            "ColumnWindow: rebuilt cumulative positions"
        );
    }
}
