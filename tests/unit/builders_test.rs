//! Tests for builder modules

use std::sync::Arc;

use chrono::NaiveDate;
use hospital_capacity_sim::builders::HospitalBuilder;
use hospital_capacity_sim::config::HospitalConfig;
use hospital_capacity_sim::core::SimulationError;
use hospital_capacity_sim::infra::SqliteResourceStore;
use hospital_capacity_sim::util::serde::ResourceKind;

#[test]
fn test_builder_defaults_seed_full_capacity() {
    let hospital = HospitalBuilder::new(HospitalConfig::default())
        .build()
        .expect("hospital");
    let states = hospital.resource_states().expect("states");
    assert_eq!(states.len(), ResourceKind::ALL.len());
    assert!(states.iter().all(|s| s.available == s.capacity));
}

#[test]
fn test_builder_overrides_time() {
    let start = NaiveDate::from_ymd_opt(2018, 1, 3)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let hospital = HospitalBuilder::new(HospitalConfig::default())
        .starting_at(start)
        .hour_scale_ms(1)
        .build()
        .expect("hospital");
    assert_eq!(hospital.config().hour_scale_ms, 1);
    assert_eq!(hospital.config().simulation_start, start);
}

#[test]
fn test_builder_with_sqlite_store() {
    let store = Arc::new(SqliteResourceStore::in_memory().expect("sqlite"));
    let hospital = HospitalBuilder::new(HospitalConfig::default())
        .with_store(store)
        .build()
        .expect("hospital");
    assert_eq!(hospital.pool().available(ResourceKind::Er).unwrap(), 9);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mut cfg = HospitalConfig::default();
    cfg.capacities.intake = 0;
    let err = HospitalBuilder::new(cfg).build().err().expect("error");
    assert!(matches!(err, SimulationError::Config(_)));
}
