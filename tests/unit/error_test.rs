//! Tests for error types

use std::time::Duration;

use cluster_dispatch::core::{AppResult, DispatchError};
use cluster_dispatch::util::serde::OperationKind;

#[test]
fn test_invalid_cost_error() {
    let err = DispatchError::InvalidCost {
        operation: OperationKind::Replenishment,
    };
    assert_eq!(format!("{err}"), "invalid cost for operation replenishment");
}

#[test]
fn test_placement_failed_error() {
    let err = DispatchError::PlacementFailed {
        node: "foodnstuff".to_string(),
        reason: "out of memory".to_string(),
    };
    assert_eq!(format!("{err}"), "placement on foodnstuff failed: out of memory");
}

#[test]
fn test_unknown_names_errors() {
    assert_eq!(
        format!("{}", DispatchError::UnknownPool("shard_grow".into())),
        "unknown pool: shard_grow"
    );
    assert_eq!(
        format!("{}", DispatchError::UnknownRoutine("contract".into())),
        "unknown maintenance routine: contract"
    );
}

#[test]
fn test_timeout_error() {
    let err = DispatchError::Timeout {
        waited: Duration::from_millis(1500),
    };
    assert_eq!(format!("{err}"), "timed out after 1.5s");
}

#[test]
fn test_app_result_wraps_dispatch_error() {
    fn fails() -> AppResult<()> {
        let checked: Result<(), DispatchError> =
            Err(DispatchError::InvalidConfig("no pools".into()));
        checked?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<DispatchError>().is_some());
    assert_eq!(err.to_string(), "invalid configuration: no pools");
}
