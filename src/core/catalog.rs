//! External collaborator interfaces: node catalog, placement, costs and
//! per-target formulas.
//!
//! The dispatcher never discovers nodes or starts processes itself. It reads
//! live attributes through [`WorkerCatalog`], derives numbers through
//! [`TargetModel`], and starts work through [`Placement`].

use serde::{Deserialize, Serialize};

use crate::core::DispatchError;
use crate::util::serde::{NodeId, OperationKind, PlacementArgs, ProcessHandle, TargetId};

/// A node that can run placed operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerNode {
    /// Node identifier.
    pub id: NodeId,
    /// Total capacity units on the node.
    pub total_capacity: f64,
    /// Capacity units in use, as reported live by the catalog.
    pub used_capacity: f64,
    /// Whether the controller may place work on this node.
    pub has_access: bool,
    /// Whether this node also hosts the controller itself.
    #[serde(default)]
    pub is_controller_host: bool,
}

impl WorkerNode {
    /// Unused capacity, less `reservation` on the controller's own host.
    #[must_use]
    pub fn free_capacity(&self, reservation: f64) -> f64 {
        let held = if self.is_controller_host { reservation } else { 0.0 };
        (self.total_capacity - self.used_capacity - held).max(0.0)
    }
}

/// A remote entity whose yield and defense the operations act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetNode {
    /// Target identifier.
    pub id: TargetId,
    /// Yield ceiling.
    pub max_yield: f64,
    /// Yield currently available.
    pub current_yield: f64,
    /// Defense floor.
    pub min_defense: f64,
    /// Defense currently in effect.
    pub current_defense: f64,
    /// Operator skill needed before the target may be acted on.
    pub required_skill_level: u32,
}

impl TargetNode {
    /// Copy of this target at its steady state: minimum defense and the
    /// given yield.
    #[must_use]
    pub fn at_steady_state(&self, current_yield: f64) -> Self {
        Self {
            current_yield,
            current_defense: self.min_defense,
            ..self.clone()
        }
    }
}

/// Read-only view of the worker and target catalogs.
pub trait WorkerCatalog {
    /// Current worker nodes, in enumeration order.
    fn list_worker_nodes(&self) -> Vec<WorkerNode>;
    /// Current target entities.
    fn list_target_nodes(&self) -> Vec<TargetNode>;
    /// Skill level of the operator, compared against
    /// [`TargetNode::required_skill_level`].
    fn operator_skill(&self) -> u32;

    /// Nodes the controller may place work on, in enumeration order.
    fn eligible_workers(&self) -> Vec<WorkerNode> {
        self.list_worker_nodes()
            .into_iter()
            .filter(|node| node.has_access)
            .collect()
    }

    /// Targets the operator is skilled enough for and that yield anything.
    fn eligible_targets(&self) -> Vec<TargetNode> {
        let skill = self.operator_skill();
        self.list_target_nodes()
            .into_iter()
            .filter(|t| t.required_skill_level <= skill && t.max_yield > 0.0)
            .collect()
    }

    /// Look up a single target by id.
    fn target(&self, id: &str) -> Option<TargetNode> {
        self.list_target_nodes().into_iter().find(|t| t.id == id)
    }
}

/// Starts operations on worker nodes and reports their liveness.
pub trait Placement {
    /// Start `threads` threads of `operation` on `node`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PlacementFailed`] if the node refuses the
    /// process.
    fn place(
        &mut self,
        operation: OperationKind,
        node: &str,
        threads: u32,
        args: &PlacementArgs,
    ) -> Result<ProcessHandle, DispatchError>;

    /// Whether a previously placed process is still running.
    fn is_active(&self, handle: ProcessHandle) -> bool;
}

/// Capacity cost of operations.
pub trait CostModel {
    /// Capacity units consumed by one thread of `operation`. `None`, zero or
    /// negative values are configuration errors.
    fn cost_per_thread(&self, operation: OperationKind) -> Option<f64>;

    /// Validated per-thread cost.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidCost`] for a missing or non-positive
    /// cost.
    fn checked_cost(&self, operation: OperationKind) -> Result<f64, DispatchError> {
        match self.cost_per_thread(operation) {
            Some(cost) if cost > 0.0 && cost.is_finite() => Ok(cost),
            _ => Err(DispatchError::InvalidCost { operation }),
        }
    }
}

/// Formulas that turn a target's attributes into per-thread effects and
/// durations. Every method is evaluated against the state passed in, so
/// callers can ask about hypothetical states such as steady state.
pub trait TargetModel {
    /// Fraction of current yield removed by one extraction thread.
    fn extraction_fraction_per_thread(&self, target: &TargetNode) -> f64;
    /// Probability that an extraction succeeds.
    fn success_probability(&self, target: &TargetNode) -> f64;
    /// Duration of an extraction in milliseconds.
    fn extraction_time_ms(&self, target: &TargetNode) -> f64;
    /// Duration of a replenishment in milliseconds.
    fn replenish_time_ms(&self, target: &TargetNode) -> f64;
    /// Duration of a mitigation in milliseconds.
    fn mitigation_time_ms(&self, target: &TargetNode) -> f64;
    /// Threads needed to multiply the current yield by `multiplier`.
    fn replenish_threads(&self, target: &TargetNode, multiplier: f64) -> f64;
    /// Defense removed by one mitigation thread.
    fn mitigation_per_thread(&self) -> f64;
    /// Defense added by `threads` extraction threads.
    fn extraction_defense_increase(&self, threads: u32) -> f64;
    /// Defense added by `threads` replenishment threads.
    fn replenish_defense_increase(&self, threads: u32) -> f64;
}

/// Everything the dispatcher needs from its environment.
pub trait Cluster: WorkerCatalog + Placement + CostModel + TargetModel {}

impl<T> Cluster for T where T: WorkerCatalog + Placement + CostModel + TargetModel {}
