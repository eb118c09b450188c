//! Host-facing glue for the `gridwindow` crate.
//!
//! The `gridwindow` crate is UI-agnostic and never performs I/O. This crate connects it to a data
//! source and a clock:
//!
//! - [`DataFetchGateway`]: the async data source contract (window, total count, preload)
//! - [`CachedGateway`]: a TTL response cache in front of any gateway
//! - [`GridController`]: drives both windows, scroll tracking and prefetch from scroll events
//! - [`QuerySpec`]: filters, sort and requested columns sent with every window request
//!
//! This crate is framework-agnostic. Futures are `!Send` and are polled on the thread that owns
//! the controller.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod cache;
mod clock;
mod controller;
mod events;
mod gateway;
mod query;

#[cfg(test)]
mod tests;

pub use cache::{CacheStats, CachedGateway};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::GridController;
pub use events::{GridEvent, SubscriptionId};
pub use gateway::{CacheScope, DataFetchGateway, WindowQuery};
pub use query::{
    Filter, FilterOperator, FilterValue, ParseOperatorError, QuerySpec, SortOrder, SortSpec,
};
