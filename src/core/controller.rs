//! The dispatch controller: owns the cluster handle, the pools and the
//! ranking and planning components, and runs scheduled jobs against them.

use crate::core::calculator::CycleParameterCalculator;
use crate::core::catalog::Cluster;
use crate::core::operations;
use crate::core::planner::CyclePlanner;
use crate::core::report::{build_status_line, StatusSink};
use crate::core::resource_pool::ResourcePool;
use crate::core::scheduler::{TaskHandler, TaskKind};
use crate::core::DispatchError;
use crate::util::serde::OperationKind;

/// Work the scheduler runs on behalf of outside collaborators, such as node
/// discovery or purchasing. The dispatcher knows nothing of what it does.
pub trait MaintenanceRoutine: Send {
    /// Name referenced by [`TaskKind::Maintenance`].
    fn name(&self) -> &str;

    /// Run once and return completion estimates in milliseconds from now.
    fn run(&mut self, now_ms: u64) -> Vec<u64>;
}

/// Runs [`TaskKind`]s against a cluster.
pub struct Controller<C> {
    cluster: C,
    pools: Vec<ResourcePool>,
    calculator: CycleParameterCalculator,
    planner: CyclePlanner,
    sink: Box<dyn StatusSink + Send>,
    routines: Vec<Box<dyn MaintenanceRoutine>>,
    filler: OperationKind,
}

impl<C> std::fmt::Debug for Controller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("pools", &self.pools)
            .field("calculator", &self.calculator)
            .field("planner", &self.planner)
            .field(
                "routines",
                &self.routines.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<C: Cluster> Controller<C> {
    /// Create a controller over `pools`.
    pub fn new(
        cluster: C,
        pools: Vec<ResourcePool>,
        calculator: CycleParameterCalculator,
        planner: CyclePlanner,
        sink: Box<dyn StatusSink + Send>,
    ) -> Self {
        Self {
            cluster,
            pools,
            calculator,
            planner,
            sink,
            routines: Vec::new(),
            filler: OperationKind::Filler,
        }
    }

    /// Register a maintenance routine, replacing one with the same name.
    #[must_use]
    pub fn with_routine(mut self, routine: Box<dyn MaintenanceRoutine>) -> Self {
        self.routines.retain(|r| r.name() != routine.name());
        self.routines.push(routine);
        self
    }

    /// The cluster handle.
    pub const fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Mutable cluster handle.
    pub fn cluster_mut(&mut self) -> &mut C {
        &mut self.cluster
    }

    /// All pools, in construction order.
    #[must_use]
    pub fn pools(&self) -> &[ResourcePool] {
        &self.pools
    }

    /// Look up a pool by name.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownPool`] if no pool has that name.
    pub fn pool(&self, name: &str) -> Result<&ResourcePool, DispatchError> {
        self.pool_index(name).map(|idx| &self.pools[idx])
    }

    /// Names of the registered maintenance routines.
    #[must_use]
    pub fn routine_names(&self) -> Vec<&str> {
        self.routines.iter().map(|r| r.name()).collect()
    }

    fn pool_index(&self, name: &str) -> Result<usize, DispatchError> {
        self.pools
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| DispatchError::UnknownPool(name.to_string()))
    }

    /// Run one job and return its completion estimates.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownPool`] or
    /// [`DispatchError::UnknownRoutine`] when the job names something that
    /// is not registered.
    pub fn run(&mut self, kind: &TaskKind, now_ms: u64) -> Result<Vec<u64>, DispatchError> {
        let estimates = match kind {
            TaskKind::Extraction { pool } => {
                let idx = self.pool_index(pool)?;
                operations::extraction_pass(
                    &mut self.pools[idx],
                    &mut self.cluster,
                    &self.calculator,
                    &mut *self.sink,
                )
            }
            TaskKind::Replenishment {
                pool,
                prioritize_short,
            } => {
                let idx = self.pool_index(pool)?;
                operations::replenishment_pass(
                    &mut self.pools[idx],
                    &mut self.cluster,
                    &self.calculator,
                    *prioritize_short,
                    &mut *self.sink,
                )
            }
            TaskKind::Mitigation { pool } => {
                let idx = self.pool_index(pool)?;
                operations::mitigation_pass(
                    &mut self.pools[idx],
                    &mut self.cluster,
                    &self.calculator,
                    &mut *self.sink,
                )
            }
            TaskKind::Batch { pool, target_rank } => {
                let idx = self.pool_index(pool)?;
                self.planner.plan_batch(
                    &mut self.pools[idx],
                    &mut self.cluster,
                    &self.calculator,
                    *target_rank,
                    &mut *self.sink,
                )
            }
            TaskKind::Maintenance { routine } => self
                .routines
                .iter_mut()
                .find(|r| r.name() == routine)
                .ok_or_else(|| DispatchError::UnknownRoutine(routine.clone()))?
                .run(now_ms),
            TaskKind::QueueReport => Vec::new(),
        };
        Ok(estimates)
    }
}

impl<C: Cluster> TaskHandler for Controller<C> {
    fn handle(&mut self, kind: &TaskKind, now_ms: u64) -> Vec<u64> {
        match self.run(kind, now_ms) {
            Ok(estimates) => estimates,
            Err(e) => {
                tracing::error!(task = ?kind, "task failed: {}", e);
                Vec::new()
            }
        }
    }

    fn share_idle(&mut self) -> u32 {
        let Some(pool) = self.pools.first() else {
            return 0;
        };
        // no filler configured
        if self.cluster.cost_per_thread(self.filler).is_none() {
            return 0;
        }
        let placed = pool.share_idle(&mut self.cluster, self.filler);
        if placed > 0 {
            tracing::debug!(threads = placed, "shared idle capacity");
        }
        placed
    }

    fn report(&mut self, source: &str, message: String) {
        self.sink.report(build_status_line(source, message));
    }
}
