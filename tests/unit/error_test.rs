//! Tests for error types

use hospital_capacity_sim::core::SimulationError;
use hospital_capacity_sim::util::serde::ResourceKind;

#[test]
fn test_store_error() {
    let err = SimulationError::Store("disk full".to_string());
    assert_eq!(format!("{}", err), "store error: disk full");
}

#[test]
fn test_unknown_patient_error() {
    let err = SimulationError::UnknownPatient("p-1".to_string());
    assert_eq!(format!("{}", err), "unknown patient: p-1");
}

#[test]
fn test_invalid_capacity_error() {
    let err = SimulationError::InvalidCapacity {
        resource: ResourceKind::Surgery,
        reason: "negative".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "invalid capacity change for Surgery: negative"
    );
}

#[test]
fn test_no_feasible_slot_error() {
    assert_eq!(format!("{}", SimulationError::NoFeasibleSlot), "no feasible slot");
}

#[test]
fn test_sqlite_error_maps_to_store() {
    let err: SimulationError = rusqlite::Error::InvalidQuery.into();
    assert!(matches!(err, SimulationError::Store(_)));
}

#[test]
fn test_app_result_wraps_simulation_error() {
    fn fails() -> hospital_capacity_sim::core::AppResult<()> {
        Err(SimulationError::Delivery("gone".to_string()))?
    }
    let err = fails().unwrap_err();
    assert_eq!(err.to_string(), "delivery error: gone");
}
