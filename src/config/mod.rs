//! Configuration models for pools, the dispatch loop and the planners.

pub mod pool;

pub use pool::{
    CalculatorConfig, DispatchConfig, JobConfig, PlannerConfig, PoolConfig, SchedulerConfig,
    ENV_PREFIX,
};
