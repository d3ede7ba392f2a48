//! # Cluster Dispatch
//!
//! Capacity-bounded dispatch of recurring, staggered operations across a
//! shared pool of worker nodes.
//!
//! The crate continuously decides which operation to run against which
//! target, on which nodes, with how many threads, and when the decision
//! needs revisiting. It never waits on the work it starts: every pass
//! returns completion estimates and the scheduler re-plans at those times
//! from live catalog state.
//!
//! ## Core pieces
//!
//! - **`ResourcePool`**: turns a thread request into first-fit placements
//!   without exceeding its fraction of total capacity. Repeated requests for
//!   the same logical task are idempotent.
//! - **`TaskScheduler`**: a single time-ordered queue of named jobs. Each
//!   run re-enqueues its job once per returned estimate, and same-name
//!   entries due close together are coalesced.
//! - **`CycleParameterCalculator`**: thread counts, durations and value
//!   scores for extraction, replenishment and mitigation.
//! - **`CyclePlanner`**: four-phase batches whose start delays are staggered
//!   so the phases land in order, one increment apart.
//!
//! The environment (node catalog, process placement, per-thread costs and
//! per-target formulas) is reached through the traits in
//! [`core::catalog`]. [`infra::InMemoryCluster`] implements all of them for
//! tests and dry runs.
//!
//! ```rust,ignore
//! use cluster_dispatch::builders::{build_controller, build_scheduler};
//! use cluster_dispatch::config::DispatchConfig;
//! use cluster_dispatch::core::TracingStatusSink;
//! use cluster_dispatch::runtime::{Driver, TokioClock};
//!
//! let mut cfg = DispatchConfig::default();
//! cfg.apply_env_overrides()?;
//! let controller = build_controller(&cfg, cluster, Box::new(TracingStatusSink))?;
//! let scheduler = build_scheduler(&cfg, 0)?;
//! let mut driver = Driver::new(scheduler, controller, TokioClock::starting_at(0));
//! driver.run(shutdown_rx).await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core dispatch logic and collaborator interfaces.
pub mod core;
/// Configuration models for pools, timing and tuning.
pub mod config;
/// Builders to construct dispatch components from configuration.
pub mod builders;
/// Infrastructure adapters standing in for the live cluster.
pub mod infra;
/// Tokio driver and reporting API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
