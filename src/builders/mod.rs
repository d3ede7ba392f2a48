//! Builders to construct dispatch components from configuration.

pub mod pool_builder;

pub use pool_builder::{
    build_calculator, build_controller, build_planner, build_pools, build_scheduler,
    scheduler_limits, seed_jobs, QUEUE_REPORT_JOB,
};
