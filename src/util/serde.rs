//! Identifier and operation types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Worker node identifier.
pub type NodeId = String;

/// Target entity identifier.
pub type TargetId = String;

/// Handle of a placed process, as returned by the placement interface.
pub type ProcessHandle = u64;

/// Operation kinds the dispatcher places on worker nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Removes a fraction of a target's current yield.
    Extraction,
    /// Restores a target's yield towards its maximum.
    Replenishment,
    /// Lowers a target's defense towards its minimum.
    Mitigation,
    /// Zero-priority work used to soak up idle capacity.
    Filler,
}

impl OperationKind {
    /// Stable lowercase name used in task keys and status lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Replenishment => "replenishment",
            Self::Mitigation => "mitigation",
            Self::Filler => "filler",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a logical task within one pool: the operation plus the
/// arguments it was placed with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    /// Operation being placed.
    pub operation: OperationKind,
    /// Target the operation acts on.
    pub target: TargetId,
    /// Start delay bound into the placement.
    pub delay_ms: u64,
}

impl TaskKey {
    /// Key for an undelayed placement.
    pub fn new(operation: OperationKind, target: impl Into<TargetId>) -> Self {
        Self {
            operation,
            target: target.into(),
            delay_ms: 0,
        }
    }

    /// Key for a placement that starts after `delay_ms`.
    pub fn delayed(operation: OperationKind, target: impl Into<TargetId>, delay_ms: u64) -> Self {
        Self {
            operation,
            target: target.into(),
            delay_ms,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delay_ms == 0 {
            write!(f, "{} {}", self.operation, self.target)
        } else {
            write!(f, "{} {}+{}ms", self.operation, self.target, self.delay_ms)
        }
    }
}

/// Arguments bound into a single placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementArgs {
    /// Target the placed process acts on. Empty for filler work.
    pub target: TargetId,
    /// Delay before the process starts acting.
    pub delay_ms: u64,
}

impl From<&TaskKey> for PlacementArgs {
    fn from(key: &TaskKey) -> Self {
        Self {
            target: key.target.clone(),
            delay_ms: key.delay_ms,
        }
    }
}

/// Convert a fractional millisecond estimate into whole milliseconds,
/// rounding up and clamping negatives and NaN to zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn ceil_ms(ms: f64) -> u64 {
    if ms.is_nan() || ms <= 0.0 {
        0
    } else if ms >= u64::MAX as f64 {
        u64::MAX
    } else {
        ms.ceil() as u64
    }
}

/// Convert a non-negative fractional thread count into whole threads,
/// rounding up. Non-finite or non-positive input yields zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn ceil_threads(threads: f64) -> u32 {
    if !threads.is_finite() || threads <= 0.0 {
        0
    } else if threads >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        threads.ceil() as u32
    }
}

/// Like [`ceil_threads`] but rounding down.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn floor_threads(threads: f64) -> u32 {
    if !threads.is_finite() || threads <= 0.0 {
        0
    } else if threads >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        threads.floor() as u32
    }
}
