//! Tokio driver for the dispatch loop and the reporting API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod driver;

pub use api::{health, list_pools, list_queue, Health, PoolSnapshot, QueueEntrySnapshot};
#[cfg(feature = "tokio-runtime")]
pub use driver::{wait_for_exit, Driver, TokioClock, DEFAULT_POLL_TICK};
