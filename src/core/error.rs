//! Error types for dispatch operations.

use std::time::Duration;

use thiserror::Error;

use crate::util::serde::{NodeId, OperationKind};

/// Errors produced by dispatch components.
///
/// Running out of capacity or finding no eligible work are not errors; they
/// are reported as data by the calls that encounter them.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Operation has a zero, negative or unknown per-thread cost.
    #[error("invalid cost for operation {operation}")]
    InvalidCost {
        /// Operation whose cost is misconfigured.
        operation: OperationKind,
    },
    /// The placement interface refused to start a process.
    #[error("placement on {node} failed: {reason}")]
    PlacementFailed {
        /// Node the placement was attempted on.
        node: NodeId,
        /// Reason reported by the placement interface.
        reason: String,
    },
    /// A task referenced a pool that does not exist.
    #[error("unknown pool: {0}")]
    UnknownPool(String),
    /// A task referenced a maintenance routine that was never registered.
    #[error("unknown maintenance routine: {0}")]
    UnknownRoutine(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A polled condition did not settle in time.
    #[error("timed out after {waited:?}")]
    Timeout {
        /// Time spent waiting.
        waited: Duration,
    },
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
