//! In-memory cluster used by tests, benches and local dry runs.
//!
//! Nodes, targets, costs and running processes live behind a shared
//! `parking_lot::Mutex`, so clones of an [`InMemoryCluster`] observe the same
//! state. Placing charges `threads × cost` to the node; finishing a process
//! releases it. Targets are static unless changed through
//! [`InMemoryCluster::set_target_state`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::catalog::{
    CostModel, Placement, TargetModel, TargetNode, WorkerCatalog, WorkerNode,
};
use crate::core::DispatchError;
use crate::util::serde::{NodeId, OperationKind, PlacementArgs, ProcessHandle};

const MITIGATION_PER_THREAD: f64 = 0.05;
const EXTRACTION_DEFENSE_PER_THREAD: f64 = 0.002;
const REPLENISH_DEFENSE_PER_THREAD: f64 = 0.004;

/// A target together with the constants its formulas use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Live attributes.
    pub node: TargetNode,
    /// Share of current yield one extraction thread removes.
    pub extraction_fraction_per_thread: f64,
    /// Probability an extraction succeeds.
    pub success_probability: f64,
    /// Extraction duration.
    pub extraction_time_ms: f64,
    /// Replenishment duration.
    pub replenish_time_ms: f64,
    /// Mitigation duration.
    pub mitigation_time_ms: f64,
    /// Multiplicative growth one replenishment thread adds.
    pub growth_per_thread: f64,
}

impl TargetProfile {
    /// Profile with default formula constants.
    #[must_use]
    pub const fn new(node: TargetNode) -> Self {
        Self {
            node,
            extraction_fraction_per_thread: 0.03,
            success_probability: 0.8,
            extraction_time_ms: 4_000.0,
            replenish_time_ms: 12_800.0,
            mitigation_time_ms: 16_000.0,
            growth_per_thread: 0.01,
        }
    }
}

/// A process started through [`Placement::place`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedProcess {
    /// Handle returned to the caller.
    pub handle: ProcessHandle,
    /// Operation run.
    pub operation: OperationKind,
    /// Node it runs on.
    pub node: NodeId,
    /// Thread count.
    pub threads: u32,
    /// Bound arguments.
    pub args: PlacementArgs,
    /// Capacity charged to the node.
    pub capacity: f64,
}

#[derive(Debug, Default)]
struct SimState {
    workers: Vec<WorkerNode>,
    targets: Vec<TargetProfile>,
    costs: HashMap<OperationKind, f64>,
    skill: u32,
    refused: HashSet<NodeId>,
    links: HashMap<NodeId, Vec<NodeId>>,
    running: HashMap<ProcessHandle, PlacedProcess>,
    history: Vec<PlacedProcess>,
    next_handle: ProcessHandle,
}

impl SimState {
    fn release(&mut self, process: &PlacedProcess) {
        if let Some(worker) = self.workers.iter_mut().find(|w| w.id == process.node) {
            worker.used_capacity = (worker.used_capacity - process.capacity).max(0.0);
        }
    }

    fn profile(&self, id: &str) -> Option<&TargetProfile> {
        self.targets.iter().find(|t| t.node.id == id)
    }
}

/// Shared, thread-safe simulated cluster.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<Mutex<SimState>>,
}

impl InMemoryCluster {
    /// Empty cluster: no nodes, no targets, no costs, skill 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an accessible worker with nothing running.
    pub fn add_worker(&self, id: impl Into<NodeId>, total_capacity: f64) {
        self.add_worker_node(WorkerNode {
            id: id.into(),
            total_capacity,
            used_capacity: 0.0,
            has_access: true,
            is_controller_host: false,
        });
    }

    /// Add the worker the controller itself runs on.
    pub fn add_controller_host(&self, id: impl Into<NodeId>, total_capacity: f64) {
        self.add_worker_node(WorkerNode {
            id: id.into(),
            total_capacity,
            used_capacity: 0.0,
            has_access: true,
            is_controller_host: true,
        });
    }

    /// Add a worker as given, replacing any node with the same id.
    pub fn add_worker_node(&self, node: WorkerNode) {
        let mut state = self.state.lock();
        state.workers.retain(|w| w.id != node.id);
        state.workers.push(node);
    }

    /// Add a target, replacing any target with the same id.
    pub fn add_target(&self, profile: TargetProfile) {
        let mut state = self.state.lock();
        state.targets.retain(|t| t.node.id != profile.node.id);
        state.targets.push(profile);
    }

    /// Set the per-thread cost of an operation.
    pub fn set_cost(&self, operation: OperationKind, cost: f64) {
        self.state.lock().costs.insert(operation, cost);
    }

    /// Set the operator's skill level.
    pub fn set_skill(&self, skill: u32) {
        self.state.lock().skill = skill;
    }

    /// Overwrite a target's live yield and defense. Returns false for an
    /// unknown target.
    pub fn set_target_state(&self, id: &str, current_yield: f64, current_defense: f64) -> bool {
        let mut state = self.state.lock();
        let Some(profile) = state.targets.iter_mut().find(|t| t.node.id == id) else {
            return false;
        };
        profile.node.current_yield = current_yield;
        profile.node.current_defense = current_defense;
        true
    }

    /// Make every later placement on `node` fail.
    pub fn refuse_node(&self, node: impl Into<NodeId>) {
        self.state.lock().refused.insert(node.into());
    }

    /// Connect two nodes in both directions.
    pub fn link(&self, a: &str, b: &str) {
        let mut state = self.state.lock();
        state.links.entry(a.to_string()).or_default().push(b.to_string());
        state.links.entry(b.to_string()).or_default().push(a.to_string());
    }

    /// Nodes directly connected to `node`, in link order.
    #[must_use]
    pub fn neighbors(&self, node: &str) -> Vec<NodeId> {
        self.state.lock().links.get(node).cloned().unwrap_or_default()
    }

    /// End a running process and release its capacity. Returns false if it
    /// was not running.
    pub fn finish(&self, handle: ProcessHandle) -> bool {
        let mut state = self.state.lock();
        match state.running.remove(&handle) {
            Some(process) => {
                state.release(&process);
                true
            }
            None => false,
        }
    }

    /// End every running process. Returns how many were running.
    pub fn finish_all(&self) -> usize {
        let mut state = self.state.lock();
        let processes: Vec<PlacedProcess> = state.running.drain().map(|(_, p)| p).collect();
        for process in &processes {
            state.release(process);
        }
        processes.len()
    }

    /// Processes still running, ordered by handle.
    #[must_use]
    pub fn running(&self) -> Vec<PlacedProcess> {
        let mut running: Vec<PlacedProcess> = self.state.lock().running.values().cloned().collect();
        running.sort_by_key(|p| p.handle);
        running
    }

    /// Every placement ever made, in order.
    #[must_use]
    pub fn placements(&self) -> Vec<PlacedProcess> {
        self.state.lock().history.clone()
    }

    fn with_profile<T>(&self, target: &TargetNode, read: impl FnOnce(&TargetProfile) -> T) -> T {
        let state = self.state.lock();
        match state.profile(&target.id) {
            Some(profile) => read(profile),
            None => read(&TargetProfile::new(target.clone())),
        }
    }
}

impl WorkerCatalog for InMemoryCluster {
    fn list_worker_nodes(&self) -> Vec<WorkerNode> {
        self.state.lock().workers.clone()
    }

    fn list_target_nodes(&self) -> Vec<TargetNode> {
        self.state
            .lock()
            .targets
            .iter()
            .map(|t| t.node.clone())
            .collect()
    }

    fn operator_skill(&self) -> u32 {
        self.state.lock().skill
    }
}

impl Placement for InMemoryCluster {
    fn place(
        &mut self,
        operation: OperationKind,
        node: &str,
        threads: u32,
        args: &PlacementArgs,
    ) -> Result<ProcessHandle, DispatchError> {
        let mut state = self.state.lock();
        if state.refused.contains(node) {
            return Err(DispatchError::PlacementFailed {
                node: node.to_string(),
                reason: "node refused the process".into(),
            });
        }
        let cost = state.costs.get(&operation).copied().unwrap_or(0.0);
        let capacity = f64::from(threads) * cost;
        let Some(worker) = state.workers.iter_mut().find(|w| w.id == node) else {
            return Err(DispatchError::PlacementFailed {
                node: node.to_string(),
                reason: "no such node".into(),
            });
        };
        if worker.total_capacity - worker.used_capacity < capacity - 1e-9 {
            return Err(DispatchError::PlacementFailed {
                node: node.to_string(),
                reason: format!(
                    "needs {capacity} units, {} free",
                    worker.total_capacity - worker.used_capacity
                ),
            });
        }
        worker.used_capacity += capacity;

        state.next_handle += 1;
        let process = PlacedProcess {
            handle: state.next_handle,
            operation,
            node: node.to_string(),
            threads,
            args: args.clone(),
            capacity,
        };
        state.history.push(process.clone());
        state.running.insert(process.handle, process);
        Ok(state.next_handle)
    }

    fn is_active(&self, handle: ProcessHandle) -> bool {
        self.state.lock().running.contains_key(&handle)
    }
}

impl CostModel for InMemoryCluster {
    fn cost_per_thread(&self, operation: OperationKind) -> Option<f64> {
        self.state.lock().costs.get(&operation).copied()
    }
}

impl TargetModel for InMemoryCluster {
    fn extraction_fraction_per_thread(&self, target: &TargetNode) -> f64 {
        self.with_profile(target, |p| p.extraction_fraction_per_thread)
    }

    fn success_probability(&self, target: &TargetNode) -> f64 {
        self.with_profile(target, |p| p.success_probability)
    }

    fn extraction_time_ms(&self, target: &TargetNode) -> f64 {
        self.with_profile(target, |p| p.extraction_time_ms)
    }

    fn replenish_time_ms(&self, target: &TargetNode) -> f64 {
        self.with_profile(target, |p| p.replenish_time_ms)
    }

    fn mitigation_time_ms(&self, target: &TargetNode) -> f64 {
        self.with_profile(target, |p| p.mitigation_time_ms)
    }

    fn replenish_threads(&self, target: &TargetNode, multiplier: f64) -> f64 {
        if multiplier <= 1.0 {
            return 0.0;
        }
        let growth = self.with_profile(target, |p| p.growth_per_thread);
        multiplier.ln() / growth.ln_1p()
    }

    fn mitigation_per_thread(&self) -> f64 {
        MITIGATION_PER_THREAD
    }

    fn extraction_defense_increase(&self, threads: u32) -> f64 {
        f64::from(threads) * EXTRACTION_DEFENSE_PER_THREAD
    }

    fn replenish_defense_increase(&self, threads: u32) -> f64 {
        f64::from(threads) * REPLENISH_DEFENSE_PER_THREAD
    }
}
