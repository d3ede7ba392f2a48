//! Builders to construct pools, the controller and the scheduler from
//! configuration.

use crate::config::DispatchConfig;
use crate::core::{
    Cluster, Controller, CycleParameterCalculator, CyclePlanner, DispatchError, PoolLimits,
    ResourcePool, SchedulerLimits, StatusSink, TaskKind, TaskScheduler,
};

/// Name of the queue report job.
pub const QUEUE_REPORT_JOB: &str = "print";

/// Build resource pools from configuration, ordered by pool name.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidConfig`] if the configuration fails
/// validation.
pub fn build_pools(cfg: &DispatchConfig) -> Result<Vec<ResourcePool>, DispatchError> {
    cfg.validate().map_err(DispatchError::InvalidConfig)?;

    let mut names: Vec<&String> = cfg.pools.keys().collect();
    names.sort();
    let pools = names
        .into_iter()
        .map(|name| {
            let pool_cfg = &cfg.pools[name];
            let limits = PoolLimits {
                usage_fraction: pool_cfg.usage_fraction,
                host_reservation: pool_cfg.host_reservation,
            };
            ResourcePool::new(name.clone(), limits)
        })
        .collect();
    Ok(pools)
}

/// Scheduler timing from configuration.
#[must_use]
pub const fn scheduler_limits(cfg: &DispatchConfig) -> SchedulerLimits {
    SchedulerLimits {
        cap_wait_ms: cfg.scheduler.cap_wait_ms,
        share_threshold_ms: cfg.scheduler.share_threshold_ms,
        default_backoff_ms: cfg.scheduler.default_backoff_ms,
        coalesce_window_ms: cfg.scheduler.coalesce_window_ms,
    }
}

/// Calculator tuned from configuration.
#[must_use]
pub const fn build_calculator(cfg: &DispatchConfig) -> CycleParameterCalculator {
    CycleParameterCalculator {
        extraction_fraction: cfg.calculator.extraction_fraction,
        replenish_headroom: cfg.calculator.replenish_headroom,
        extraction_min_yield_ratio: cfg.calculator.extraction_min_yield_ratio,
    }
}

/// Batch planner tuned from configuration.
#[must_use]
pub const fn build_planner(cfg: &DispatchConfig) -> CyclePlanner {
    CyclePlanner {
        increment_ms: cfg.planner.increment_ms,
        max_iterations: cfg.planner.max_iterations,
        steady_yield_ratio: cfg.planner.steady_yield_ratio,
        steady_defense_ratio: cfg.planner.steady_defense_ratio,
    }
}

/// Controller over `cluster` with every configured pool.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidConfig`] if the configuration fails
/// validation.
pub fn build_controller<C: Cluster>(
    cfg: &DispatchConfig,
    cluster: C,
    sink: Box<dyn StatusSink + Send>,
) -> Result<Controller<C>, DispatchError> {
    let pools = build_pools(cfg)?;
    Ok(Controller::new(
        cluster,
        pools,
        build_calculator(cfg),
        build_planner(cfg),
        sink,
    ))
}

/// Jobs to seed, in configuration order, with the queue report last when
/// enabled.
#[must_use]
pub fn seed_jobs(cfg: &DispatchConfig) -> Vec<(String, TaskKind)> {
    let mut jobs: Vec<(String, TaskKind)> = cfg
        .jobs
        .iter()
        .map(|job| (job.name.clone(), job.kind.clone()))
        .collect();
    if cfg.scheduler.report_interval_enabled {
        jobs.push((QUEUE_REPORT_JOB.to_string(), TaskKind::QueueReport));
    }
    jobs
}

/// Scheduler with every configured job due at `now_ms`.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidConfig`] if the configuration fails
/// validation.
pub fn build_scheduler(cfg: &DispatchConfig, now_ms: u64) -> Result<TaskScheduler, DispatchError> {
    cfg.validate().map_err(DispatchError::InvalidConfig)?;
    let mut scheduler = TaskScheduler::new(scheduler_limits(cfg));
    scheduler.seed(seed_jobs(cfg), now_ms);
    tracing::info!(jobs = scheduler.len(), "scheduler seeded");
    Ok(scheduler)
}
