//! Serializable status snapshots of pools and the scheduler queue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{Cluster, Controller, ResourcePool, TaskKind, TaskScheduler, WorkerCatalog};

/// Pool snapshot data for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Pool identifier.
    pub name: String,
    /// Configured share of total capacity.
    pub usage_fraction: f64,
    /// Capacity the pool may consume in total.
    pub ceiling: f64,
    /// Capacity charged to the pool.
    pub used: f64,
    /// Capacity the pool could still place.
    pub available: f64,
    /// Live allocation records.
    pub records: usize,
    /// Threads across all records.
    pub threads: u64,
}

impl PoolSnapshot {
    /// Snapshot `pool` against the current catalog.
    pub fn capture<C: WorkerCatalog + ?Sized>(pool: &ResourcePool, catalog: &C) -> Self {
        Self {
            name: pool.name().to_string(),
            usage_fraction: pool.limits().usage_fraction,
            ceiling: pool.ceiling(catalog),
            used: pool.used(),
            available: pool.available_capacity(catalog),
            records: pool.records().len(),
            threads: pool.records().iter().map(|r| u64::from(r.threads)).sum(),
        }
    }
}

/// One queued job instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntrySnapshot {
    /// Instance identifier.
    pub id: Uuid,
    /// Job name.
    pub name: String,
    /// What the job runs.
    pub kind: TaskKind,
    /// Absolute due time.
    pub due_at_ms: u64,
    /// Time until due, zero if overdue.
    pub due_in_ms: u64,
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag: jobs are queued and in due order.
    pub ok: bool,
    /// Queued job instances.
    pub queued: usize,
    /// Pools under management.
    pub pools: usize,
    /// Worker nodes currently eligible for placement.
    pub eligible_workers: usize,
}

/// Snapshot every pool of `controller`.
pub fn list_pools<C: Cluster>(controller: &Controller<C>) -> Vec<PoolSnapshot> {
    controller
        .pools()
        .iter()
        .map(|pool| PoolSnapshot::capture(pool, controller.cluster()))
        .collect()
}

/// Snapshot the queue, earliest first.
#[must_use]
pub fn list_queue(scheduler: &TaskScheduler, now_ms: u64) -> Vec<QueueEntrySnapshot> {
    scheduler
        .queue()
        .iter()
        .map(|task| QueueEntrySnapshot {
            id: task.id,
            name: task.name.clone(),
            kind: task.kind.clone(),
            due_at_ms: task.due_at_ms,
            due_in_ms: task.due_at_ms.saturating_sub(now_ms),
        })
        .collect()
}

/// Return a health payload.
pub fn health<C: Cluster>(scheduler: &TaskScheduler, controller: &Controller<C>) -> Health {
    Health {
        ok: !scheduler.is_empty() && scheduler.is_sorted(),
        queued: scheduler.len(),
        pools: controller.pools().len(),
        eligible_workers: controller.cluster().eligible_workers().len(),
    }
}
