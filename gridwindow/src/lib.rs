//! A headless two-dimensional virtualization engine for data grids.
//!
//! For host-facing glue (data gateways, clocks, the grid controller), see the
//! `gridwindow-adapter` crate.
//!
//! This crate focuses on the core algorithms needed to scroll through grids with an effectively
//! unbounded number of rows and columns: fixed-height row windowing, variable-width column
//! windowing with pinned edges, element recycling, scroll velocity tracking, and predictive
//! prefetch planning.
//!
//! It is UI-agnostic. A TUI/GUI layer is expected to provide:
//! - viewport sizes and scroll offsets for both axes
//! - a render node type implementing [`RenderNode`]
//! - data slices in response to [`WindowRequest`]s
//! - the current time (`now_ms`) for scroll tracking
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod columns;
mod error;
mod options;
mod pool;
mod prefetch;
mod rows;
mod scroll;
mod state;
mod types;


pub use columns::{
    ColumnDescriptor, ColumnLayout, ColumnPlacement, ColumnSpan, ColumnWindow,
    CumulativePositions, PinnedSide, RenderingInfo,
};
pub use error::{ConfigError, FetchError, LayoutInconsistency, StaleResponse};
pub use options::GridOptions;
pub use pool::{ElementId, PoolStats, RecyclePool, RenderNode, RenderedElement};
pub use prefetch::{
    PatternAnalyzer, PatternContext, PrefetchPlanner, VelocityAnalyzer, threshold_ranges,
};
pub use rows::{DataSlice, FetchTicket, RowUpdate, RowWindow, WindowRequest};
pub use scroll::{
    METRICS_WINDOW, PreloadPriority, ScrollEnd, ScrollMetrics, ScrollPhase, ScrollTick,
    ScrollTracker, velocity_metrics,
};
pub use state::{FrameState, ViewportState};
pub use types::{
    Axis, ElementKind, IndexRange, PreloadRange, ScrollDirection, ScrollSample, WindowChange,
};
