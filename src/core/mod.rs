//! Runtime-agnostic dispatch logic: capacity accounting, ranking, batch
//! planning and the recurring-task scheduler.

pub mod calculator;
pub mod catalog;
pub mod controller;
pub mod error;
pub mod operations;
pub mod planner;
pub mod report;
pub mod resource_pool;
pub mod scheduler;
pub mod topology;

pub use calculator::{CycleParameterCalculator, CycleThreads, CycleTimes, OperationParams};
pub use catalog::{
    Cluster, CostModel, Placement, TargetModel, TargetNode, WorkerCatalog, WorkerNode,
};
pub use controller::{Controller, MaintenanceRoutine};
pub use error::{AppResult, DispatchError};
pub use operations::{deploy_common, extraction_pass, mitigation_pass, replenishment_pass};
pub use planner::{BatchReport, CyclePlanner, StaggerDelays};
pub use report::{
    build_status_line, InMemoryStatusSink, StatusLine, StatusSink, TracingStatusSink,
};
pub use resource_pool::{AllocationRecord, DeployOutcome, PoolLimits, ResourcePool};
pub use scheduler::{ScheduledTask, SchedulerLimits, Step, TaskHandler, TaskKind, TaskScheduler};
pub use topology::{discover_all, find_route};
