//! Capacity-bounded resource pool.
//!
//! A pool owns the allocation records of everything it placed and may only
//! ever consume `usage_fraction` of the total capacity of the eligible worker
//! nodes. Several pools can share the same nodes; they rely on disjoint
//! fractions, there is no cross-pool arbitration.

use serde::{Deserialize, Serialize};

use crate::core::catalog::{Cluster, Placement, WorkerCatalog, WorkerNode};
use crate::core::DispatchError;
use crate::util::serde::{
    floor_threads, NodeId, OperationKind, PlacementArgs, ProcessHandle, TaskKey,
};

/// Bookkeeping entry linking one placement to the capacity it consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Node the process runs on.
    pub node: NodeId,
    /// Logical task the process belongs to.
    pub key: TaskKey,
    /// Handle returned by the placement interface.
    pub handle: ProcessHandle,
    /// Capacity units charged to the pool.
    pub capacity_used: f64,
    /// Threads placed.
    pub threads: u32,
}

/// Result of a [`ResourcePool::deploy`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeployOutcome {
    /// Threads placed by this call.
    pub deployed: u32,
    /// Threads now active for the task key, capped at what was requested.
    pub total_deployed: u32,
}

impl DeployOutcome {
    /// Whether fewer threads are active than were requested.
    #[must_use]
    pub const fn is_partial(&self, requested: u32) -> bool {
        self.total_deployed < requested
    }
}

/// Configuration values for capacity enforcement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolLimits {
    /// Share of total capacity this pool may consume, in (0, 1].
    pub usage_fraction: f64,
    /// Capacity held back on the controller's own host.
    pub host_reservation: f64,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            usage_fraction: 1.0,
            host_reservation: 32.0,
        }
    }
}

/// Resource pool with capacity accounting over a shared set of worker nodes.
///
/// `used` is a cached sum of `capacity_used` over the records and is kept in
/// step with them by every mutation.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    name: String,
    limits: PoolLimits,
    records: Vec<AllocationRecord>,
    used: f64,
}

impl ResourcePool {
    /// Create an empty pool.
    pub fn new(name: impl Into<String>, limits: PoolLimits) -> Self {
        Self {
            name: name.into(),
            limits,
            records: Vec::new(),
            used: 0.0,
        }
    }

    /// Pool name used in status lines.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Capacity currently charged to this pool.
    #[must_use]
    pub const fn used(&self) -> f64 {
        self.used
    }

    /// Live allocation records, in placement order.
    #[must_use]
    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }

    /// Threads recorded for `key`.
    #[must_use]
    pub fn active_threads(&self, key: &TaskKey) -> u32 {
        self.records
            .iter()
            .filter(|r| &r.key == key)
            .map(|r| r.threads)
            .sum()
    }

    /// Total capacity of all eligible worker nodes.
    pub fn total_capacity<C: WorkerCatalog + ?Sized>(catalog: &C) -> f64 {
        catalog
            .eligible_workers()
            .iter()
            .map(|n| n.total_capacity)
            .sum()
    }

    /// `floor(usage_fraction × total capacity)`.
    pub fn ceiling<C: WorkerCatalog + ?Sized>(&self, catalog: &C) -> f64 {
        (self.limits.usage_fraction * Self::total_capacity(catalog)).floor()
    }

    /// Capacity this pool may still consume: the smaller of its remaining
    /// share and the free capacity actually left on the nodes.
    pub fn available_capacity<C: WorkerCatalog + ?Sized>(&self, catalog: &C) -> f64 {
        let headroom = (self.ceiling(catalog) - self.used).max(0.0);
        let free: f64 = catalog
            .eligible_workers()
            .iter()
            .map(|n| n.free_capacity(self.limits.host_reservation))
            .sum();
        headroom.min(free)
    }

    /// Drop records whose process is no longer running and reclaim their
    /// capacity. Returns the number of records removed.
    pub fn refresh_usage<P: Placement + ?Sized>(&mut self, placement: &P) -> usize {
        let before = self.records.len();
        let mut reclaimed = 0.0;
        self.records.retain(|r| {
            let alive = placement.is_active(r.handle);
            if !alive {
                reclaimed += r.capacity_used;
            }
            alive
        });
        self.used = (self.used - reclaimed).max(0.0);
        self.debug_check_used();
        let removed = before - self.records.len();
        if removed > 0 {
            tracing::debug!(pool = %self.name, removed, reclaimed, "reclaimed finished placements");
        }
        removed
    }

    /// Place up to `desired` threads for `key`, counting threads already
    /// active for the same key. Configuration errors are logged and reported
    /// as nothing deployed.
    pub fn deploy<C: Cluster + ?Sized>(
        &mut self,
        cluster: &mut C,
        desired: u32,
        key: &TaskKey,
    ) -> DeployOutcome {
        match self.try_deploy(cluster, desired, key) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(pool = %self.name, key = %key, "deploy skipped: {}", e);
                DeployOutcome::default()
            }
        }
    }

    /// Fallible form of [`deploy`](Self::deploy).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidCost`] when the operation has no
    /// positive per-thread cost.
    pub fn try_deploy<C: Cluster + ?Sized>(
        &mut self,
        cluster: &mut C,
        desired: u32,
        key: &TaskKey,
    ) -> Result<DeployOutcome, DispatchError> {
        self.refresh_usage(&*cluster);
        self.place_up_to(cluster, desired, key)
    }

    /// Place `threads` more threads for `key` on top of those still running
    /// under it. Finished records are reclaimed before the current count is
    /// read, so reclaimed threads are not placed twice.
    pub fn deploy_additional<C: Cluster + ?Sized>(
        &mut self,
        cluster: &mut C,
        threads: u32,
        key: &TaskKey,
    ) -> DeployOutcome {
        self.refresh_usage(&*cluster);
        let desired = self.active_threads(key).saturating_add(threads);
        match self.place_up_to(cluster, desired, key) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(pool = %self.name, key = %key, "deploy skipped: {}", e);
                DeployOutcome::default()
            }
        }
    }

    /// First-fit placement against already refreshed records.
    fn place_up_to<C: Cluster + ?Sized>(
        &mut self,
        cluster: &mut C,
        desired: u32,
        key: &TaskKey,
    ) -> Result<DeployOutcome, DispatchError> {
        let cost = cluster.checked_cost(key.operation)?;
        let adjusted = desired.saturating_sub(self.active_threads(key));

        let ceiling = self.ceiling(&*cluster) - self.used;
        let allowed = floor_threads(ceiling / cost).min(adjusted);

        let args = PlacementArgs::from(key);
        let mut deployed = 0u32;
        for node in cluster.eligible_workers() {
            if deployed >= allowed {
                break;
            }
            let fit = floor_threads(node.free_capacity(self.limits.host_reservation) / cost);
            let threads = fit.min(allowed - deployed);
            if threads == 0 {
                continue;
            }
            match cluster.place(key.operation, &node.id, threads, &args) {
                Ok(handle) => {
                    let capacity_used = f64::from(threads) * cost;
                    self.records.push(AllocationRecord {
                        node: node.id.clone(),
                        key: key.clone(),
                        handle,
                        capacity_used,
                        threads,
                    });
                    self.used += capacity_used;
                    deployed += threads;
                    tracing::debug!(
                        pool = %self.name,
                        node = %node.id,
                        threads,
                        key = %key,
                        "placed"
                    );
                }
                Err(e) => {
                    tracing::warn!(pool = %self.name, node = %node.id, "placement failed: {}", e);
                }
            }
        }
        self.debug_check_used();

        Ok(DeployOutcome {
            deployed,
            total_deployed: desired - (adjusted - deployed),
        })
    }

    /// Fill free capacity on every eligible node with `filler` work,
    /// ignoring the usage fraction. Filler placements are not recorded and
    /// never count against [`used`](Self::used). Returns the threads placed.
    pub fn share_idle<C: Cluster + ?Sized>(&self, cluster: &mut C, filler: OperationKind) -> u32 {
        let cost = match cluster.checked_cost(filler) {
            Ok(cost) => cost,
            Err(e) => {
                tracing::error!(pool = %self.name, "idle share skipped: {}", e);
                return 0;
            }
        };
        let args = PlacementArgs {
            target: String::new(),
            delay_ms: 0,
        };
        let nodes: Vec<WorkerNode> = cluster.eligible_workers();
        let mut total = 0u32;
        for node in nodes {
            let threads = floor_threads(node.free_capacity(self.limits.host_reservation) / cost);
            if threads == 0 {
                continue;
            }
            match cluster.place(filler, &node.id, threads, &args) {
                Ok(_) => total = total.saturating_add(threads),
                Err(e) => tracing::warn!(node = %node.id, "filler placement failed: {}", e),
            }
        }
        if total > 0 {
            tracing::info!(pool = %self.name, threads = total, "sharing idle capacity");
        }
        total
    }

    fn debug_check_used(&self) {
        debug_assert!(
            (self.records.iter().map(|r| r.capacity_used).sum::<f64>() - self.used).abs() < 1e-6,
            "cached usage out of step with records"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::cluster::InMemoryCluster;

    fn limits(fraction: f64) -> PoolLimits {
        PoolLimits {
            usage_fraction: fraction,
            host_reservation: 0.0,
        }
    }

    fn outcome(deployed: u32, total_deployed: u32) -> DeployOutcome {
        DeployOutcome {
            deployed,
            total_deployed,
        }
    }

    fn three_nodes() -> InMemoryCluster {
        let cluster = InMemoryCluster::new();
        cluster.add_worker("n1", 40.0);
        cluster.add_worker("n2", 40.0);
        cluster.add_worker("n3", 20.0);
        cluster.set_cost(OperationKind::Extraction, 5.0);
        cluster
    }

    #[test]
    fn test_deploy_respects_fraction_then_idempotent() {
        let mut cluster = three_nodes();
        let mut pool = ResourcePool::new("shard", limits(0.5));
        let key = TaskKey::new(OperationKind::Extraction, "t");

        let first = pool.deploy(&mut cluster, 10, &key);
        assert_eq!(first, outcome(10, 10));
        assert!((pool.used() - 50.0).abs() < 1e-9);

        let second = pool.deploy(&mut cluster, 15, &key);
        assert_eq!(second, outcome(0, 10));
        assert!(second.is_partial(15));

        let repeat = pool.deploy(&mut cluster, 10, &key);
        assert_eq!(repeat, outcome(0, 10));
    }

    #[test]
    fn test_first_fit_in_catalog_order() {
        let mut cluster = three_nodes();
        let mut pool = ResourcePool::new("shard", limits(1.0));
        let key = TaskKey::new(OperationKind::Extraction, "t");

        pool.deploy(&mut cluster, 10, &key);
        let nodes: Vec<(&str, u32)> = pool
            .records()
            .iter()
            .map(|r| (r.node.as_str(), r.threads))
            .collect();
        assert_eq!(nodes, vec![("n1", 8), ("n2", 2)]);
    }

    #[test]
    fn test_refresh_reclaims_finished() {
        let mut cluster = three_nodes();
        let mut pool = ResourcePool::new("shard", limits(1.0));
        let key = TaskKey::new(OperationKind::Extraction, "t");
        pool.deploy(&mut cluster, 10, &key);
        let handle = pool.records()[0].handle;

        cluster.finish(handle);
        assert_eq!(pool.refresh_usage(&cluster), 1);
        assert_eq!(pool.active_threads(&key), 2);
        assert!((pool.used() - 10.0).abs() < 1e-9);

        let again = pool.deploy(&mut cluster, 10, &key);
        assert_eq!(again, outcome(8, 10));
    }

    #[test]
    fn test_deploy_additional_counts_after_reclaim() {
        let mut cluster = three_nodes();
        let mut pool = ResourcePool::new("shard", limits(1.0));
        let key = TaskKey::delayed(OperationKind::Extraction, "t", 150);
        pool.deploy(&mut cluster, 10, &key);
        cluster.finish(pool.records()[0].handle);

        let more = pool.deploy_additional(&mut cluster, 3, &key);
        assert_eq!(more, outcome(3, 5));
        assert_eq!(pool.active_threads(&key), 5);
    }

    #[test]
    fn test_zero_cost_is_reported_as_nothing_deployed() {
        let mut cluster = three_nodes();
        cluster.set_cost(OperationKind::Mitigation, 0.0);
        let mut pool = ResourcePool::new("shard", limits(1.0));
        let key = TaskKey::new(OperationKind::Mitigation, "t");

        assert!(matches!(
            pool.try_deploy(&mut cluster, 4, &key),
            Err(DispatchError::InvalidCost { operation: OperationKind::Mitigation })
        ));
        assert_eq!(pool.deploy(&mut cluster, 4, &key), DeployOutcome::default());
        assert!(pool.records().is_empty());
    }

    #[test]
    fn test_unknown_cost_is_invalid() {
        let mut cluster = three_nodes();
        let mut pool = ResourcePool::new("shard", limits(1.0));
        let key = TaskKey::new(OperationKind::Replenishment, "t");
        assert!(pool.try_deploy(&mut cluster, 1, &key).is_err());
    }

    #[test]
    fn test_failed_node_is_skipped() {
        let mut cluster = three_nodes();
        cluster.refuse_node("n1");
        let mut pool = ResourcePool::new("shard", limits(1.0));
        let key = TaskKey::new(OperationKind::Extraction, "t");

        let outcome = pool.deploy(&mut cluster, 10, &key);
        assert_eq!(outcome.deployed, 10);
        assert!(pool.records().iter().all(|r| r.node != "n1"));
    }

    #[test]
    fn test_controller_host_reservation() {
        let mut cluster = InMemoryCluster::new();
        cluster.add_controller_host("home", 64.0);
        cluster.set_cost(OperationKind::Extraction, 4.0);
        let mut pool = ResourcePool::new(
            "shard",
            PoolLimits {
                usage_fraction: 1.0,
                host_reservation: 32.0,
            },
        );
        let key = TaskKey::new(OperationKind::Extraction, "t");
        let outcome = pool.deploy(&mut cluster, 100, &key);
        assert_eq!(outcome.deployed, 8);
    }

    #[test]
    fn test_share_idle_is_not_charged() {
        let mut cluster = three_nodes();
        cluster.set_cost(OperationKind::Filler, 4.0);
        let mut pool = ResourcePool::new("shard", limits(0.5));
        let key = TaskKey::new(OperationKind::Extraction, "t");
        pool.deploy(&mut cluster, 10, &key);

        let shared = pool.share_idle(&mut cluster, OperationKind::Filler);
        // n1: 0 free, n2: 30 free, n3: 20 free
        assert_eq!(shared, 7 + 5);
        assert!((pool.used() - 50.0).abs() < 1e-9);
        assert_eq!(pool.records().len(), 2);
    }

    #[test]
    fn test_available_capacity_is_min_of_share_and_free() {
        let mut cluster = three_nodes();
        let mut pool = ResourcePool::new("shard", limits(0.5));
        assert!((pool.available_capacity(&cluster) - 50.0).abs() < 1e-9);
        let key = TaskKey::new(OperationKind::Extraction, "t");
        pool.deploy(&mut cluster, 4, &key);
        assert!((pool.available_capacity(&cluster) - 30.0).abs() < 1e-9);
    }
}
