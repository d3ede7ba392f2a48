//! Tests for builder modules

use cluster_dispatch::builders::{
    build_calculator, build_controller, build_planner, build_pools, build_scheduler,
    scheduler_limits, seed_jobs, QUEUE_REPORT_JOB,
};
use cluster_dispatch::config::{DispatchConfig, PoolConfig};
use cluster_dispatch::core::{DispatchError, TaskKind, TracingStatusSink};
use cluster_dispatch::infra::InMemoryCluster;

#[test]
fn test_pools_built_in_name_order() {
    let pools = build_pools(&DispatchConfig::default()).unwrap();
    let names: Vec<&str> = pools.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["shard_extract", "shard_mitigate"]);
    assert!((pools[0].limits().usage_fraction - 0.8).abs() < f64::EPSILON);
}

#[test]
fn test_invalid_config_is_reported() {
    let mut cfg = DispatchConfig::default();
    cfg.pools
        .insert("shard_extract".into(), PoolConfig::with_fraction(2.0));
    assert!(matches!(build_pools(&cfg), Err(DispatchError::InvalidConfig(_))));
    assert!(build_controller(&cfg, InMemoryCluster::new(), Box::new(TracingStatusSink)).is_err());
    assert!(build_scheduler(&cfg, 0).is_err());
}

#[test]
fn test_tuning_carried_over() {
    let mut cfg = DispatchConfig::default();
    cfg.planner.increment_ms = 25;
    cfg.calculator.extraction_fraction = 0.25;
    cfg.scheduler.share_threshold_ms = 4_000;

    assert_eq!(build_planner(&cfg).increment_ms, 25);
    assert!((build_calculator(&cfg).extraction_fraction - 0.25).abs() < f64::EPSILON);
    assert_eq!(scheduler_limits(&cfg).share_threshold_ms, 4_000);
}

#[test]
fn test_seed_jobs_adds_queue_report() {
    let mut cfg = DispatchConfig::default();
    let jobs = seed_jobs(&cfg);
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[2], (QUEUE_REPORT_JOB.to_string(), TaskKind::QueueReport));

    cfg.scheduler.report_interval_enabled = false;
    assert_eq!(seed_jobs(&cfg).len(), 2);
}

#[test]
fn test_scheduler_seeded_at_now() {
    let scheduler = build_scheduler(&DispatchConfig::default(), 1_234).unwrap();
    assert_eq!(scheduler.len(), 3);
    assert!(scheduler.queue().iter().all(|t| t.due_at_ms == 1_234));
    assert_eq!(scheduler.queue()[0].name, "mitigate");
}

#[test]
fn test_controller_has_every_pool() {
    let controller = build_controller(
        &DispatchConfig::default(),
        InMemoryCluster::new(),
        Box::new(TracingStatusSink),
    )
    .unwrap();
    assert!(controller.pool("shard_extract").is_ok());
    assert!(matches!(
        controller.pool("shard_grow"),
        Err(DispatchError::UnknownPool(_))
    ));
}
