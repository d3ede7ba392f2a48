//! Tests for configuration validation

use std::collections::HashMap;
use std::io::Write;

use cluster_dispatch::config::{DispatchConfig, JobConfig, PoolConfig};
use cluster_dispatch::core::TaskKind;

#[test]
fn test_default_config_is_valid() {
    let cfg = DispatchConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.pools.len(), 2);
    assert!((cfg.pools["shard_extract"].usage_fraction - 0.8).abs() < f64::EPSILON);
    assert!((cfg.pools["shard_mitigate"].host_reservation - 32.0).abs() < f64::EPSILON);
    assert_eq!(cfg.scheduler.cap_wait_ms, 11_000);
    assert_eq!(cfg.planner.increment_ms, 50);
}

#[test]
fn test_pool_config_fraction_bounds() {
    assert!(PoolConfig::with_fraction(1.0).validate().is_ok());
    assert!(PoolConfig::with_fraction(0.0).validate().is_err());
    assert!(PoolConfig::with_fraction(1.01).validate().is_err());
    assert!(PoolConfig::with_fraction(f64::NAN).validate().is_err());

    let negative = PoolConfig {
        usage_fraction: 0.5,
        host_reservation: -1.0,
    };
    assert!(negative.validate().is_err());
}

#[test]
fn test_overlapping_fractions_rejected() {
    let mut cfg = DispatchConfig::default();
    cfg.pools
        .insert("shard_grow".to_string(), PoolConfig::with_fraction(0.6));
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("sum"), "{err}");
}

#[test]
fn test_empty_pools_rejected() {
    let cfg = DispatchConfig {
        pools: HashMap::new(),
        jobs: Vec::new(),
        ..DispatchConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_timing_rejected() {
    let mut cfg = DispatchConfig::default();
    cfg.scheduler.coalesce_window_ms = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = DispatchConfig::default();
    cfg.planner.max_iterations = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_job_with_unknown_pool_rejected() {
    let mut cfg = DispatchConfig::default();
    cfg.jobs.push(JobConfig::new(
        "grow",
        TaskKind::Replenishment {
            pool: "shard_grow".into(),
            prioritize_short: false,
        },
    ));
    assert!(cfg.validate().unwrap_err().contains("shard_grow"));
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "pools": {
            "shard_hack": { "usage_fraction": 0.8 },
            "shard_weaken": { "usage_fraction": 0.1, "host_reservation": 16 }
        },
        "scheduler": { "cap_wait_ms": 5000 },
        "jobs": [
            { "name": "weaken", "kind": "mitigation", "pool": "shard_weaken" },
            { "name": "batch", "kind": "batch", "pool": "shard_hack", "target_rank": 1 },
            { "name": "spread", "kind": "maintenance", "routine": "spread" }
        ]
    }"#;

    let cfg = DispatchConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.scheduler.cap_wait_ms, 5_000);
    assert_eq!(cfg.scheduler.default_backoff_ms, 60_000);
    assert!((cfg.pools["shard_weaken"].host_reservation - 16.0).abs() < f64::EPSILON);
    assert_eq!(cfg.jobs.len(), 3);
    assert_eq!(
        cfg.jobs[1].kind,
        TaskKind::Batch {
            pool: "shard_hack".into(),
            target_rank: 1
        }
    );
}

#[test]
fn test_config_from_bad_json() {
    let err = DispatchConfig::from_json_str("{ \"pools\": 3 }").unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

#[test]
fn test_env_overrides() {
    let mut cfg = DispatchConfig::default();
    let vars = HashMap::from([
        ("DISPATCH_CAP_WAIT_MS", "7000"),
        ("DISPATCH_INCREMENT_MS", " 20 "),
    ]);
    cfg.apply_overrides_from(|name| vars.get(name).map(ToString::to_string))
        .unwrap();
    assert_eq!(cfg.scheduler.cap_wait_ms, 7_000);
    assert_eq!(cfg.planner.increment_ms, 20);
    assert_eq!(cfg.scheduler.coalesce_window_ms, 10_000);

    let bad = HashMap::from([("DISPATCH_MAX_ITERATIONS", "many")]);
    assert!(cfg
        .apply_overrides_from(|name| bad.get(name).map(ToString::to_string))
        .is_err());

    let zero = HashMap::from([("DISPATCH_COALESCE_WINDOW_MS", "0")]);
    assert!(cfg
        .apply_overrides_from(|name| zero.get(name).map(ToString::to_string))
        .is_err());
}

#[test]
fn test_load_file() {
    let path = std::env::temp_dir().join(format!("dispatch-config-{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(br#"{ "planner": { "max_iterations": 10 } }"#)
        .unwrap();
    drop(file);

    let cfg = DispatchConfig::load_file(&path).unwrap();
    assert_eq!(cfg.planner.max_iterations, 10);
    std::fs::remove_file(&path).unwrap();

    let missing = DispatchConfig::load_file(&path).unwrap_err();
    assert!(format!("{missing:#}").contains("reading config file"));
}
