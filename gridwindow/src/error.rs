use alloc::string::String;

use crate::IndexRange;
use crate::rows::FetchTicket;

/// Rejected configuration. This is the only hard failure in the crate.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("item height must be greater than zero")]
    ZeroItemHeight,

    #[error("column `{fieldname}` must have a width greater than zero")]
    ZeroColumnWidth { fieldname: String },

    #[error("column `{fieldname}` is declared more than once")]
    DuplicateColumn { fieldname: String },

    #[error("column `{fieldname}` is not part of the layout")]
    UnknownColumn { fieldname: String },

    #[error("scroll history capacity must be greater than zero")]
    ZeroHistoryCapacity,

    #[error("prefetch batch size must be greater than zero")]
    ZeroPrefetchBatch,

    #[error("column virtualization ratio must be a finite, non-negative number (got {0})")]
    InvalidVirtualizationRatio(f32),

    #[error("preload threshold must lie in [0, 1] (got {0})")]
    InvalidPreloadThreshold(f32),
}

/// A data gateway call that did not produce a slice.
///
/// Fetch failures never interrupt rendering: the window keeps the last slice it applied.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("data request failed: {message}")]
    Failed { message: String },

    #[error("data source is unavailable")]
    Unavailable,

    #[error("data request was cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// A response that arrived for a window that is no longer current.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("discarded stale response {ticket:?} for {origin:?} (current window {current:?})")]
pub struct StaleResponse {
    pub ticket: FetchTicket,
    pub origin: IndexRange,
    pub current: IndexRange,
}

/// Cumulative column positions disagree with the declared widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("column {index} spans {actual}px but declares {declared}px")]
pub struct LayoutInconsistency {
    pub index: usize,
    pub declared: u32,
    pub actual: u64,
}
