//! Tests for utility functions

use cluster_dispatch::util::{
    ceil_ms, ceil_threads, floor_threads, init_tracing, Clock, ManualClock, OperationKind,
    PlacementArgs, TaskKey,
};

#[test]
fn test_operation_kind_names() {
    assert_eq!(OperationKind::Extraction.to_string(), "extraction");
    assert_eq!(
        serde_json::to_string(&OperationKind::Mitigation).unwrap(),
        "\"mitigation\""
    );
}

#[test]
fn test_task_key_display_and_args() {
    let plain = TaskKey::new(OperationKind::Extraction, "n00dles");
    let delayed = TaskKey::delayed(OperationKind::Mitigation, "n00dles", 150);
    assert_eq!(plain.to_string(), "extraction n00dles");
    assert_eq!(delayed.to_string(), "mitigation n00dles+150ms");
    assert_ne!(plain, TaskKey::new(OperationKind::Mitigation, "n00dles"));

    let args = PlacementArgs::from(&delayed);
    assert_eq!(args.target, "n00dles");
    assert_eq!(args.delay_ms, 150);
}

#[test]
fn test_rounding_helpers_clamp() {
    assert_eq!(ceil_ms(2500.2), 2501);
    assert_eq!(ceil_ms(-300.0), 0);
    assert_eq!(ceil_threads(13.01), 14);
    assert_eq!(floor_threads(13.99), 13);
    assert_eq!(floor_threads(f64::NAN), 0);
}

#[test]
fn test_manual_clock_is_shared() {
    let clock = ManualClock::new(1_000);
    let view = clock.clone();
    clock.advance(500);
    assert_eq!(view.now_ms(), 1_500);
    view.set(42);
    assert_eq!(clock.now_ms(), 42);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("subscriber installed");
    assert!(tracing::dispatcher::has_been_set());
}
