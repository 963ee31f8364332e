//! Tests for configuration validation

use std::collections::HashMap;

use hospital_capacity_sim::config::{HospitalConfig, ResourceCapacities};
use hospital_capacity_sim::util::serde::ResourceKind;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (format!("HOSPITAL_SIM_{k}"), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = HospitalConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.capacities, ResourceCapacities::default());
    assert_eq!(cfg.capacities.get(ResourceKind::Intake), 4);
    assert_eq!(cfg.capacities.get(ResourceKind::Surgery), 5);
    assert_eq!(cfg.capacities.get(ResourceKind::BedA), 30);
    assert_eq!(cfg.capacities.get(ResourceKind::BedB), 40);
    assert_eq!(cfg.capacities.get(ResourceKind::Er), 9);
    assert_eq!(cfg.night_surgery_reduction, 4);
    assert_eq!(cfg.backpressure_threshold, 2);
}

#[test]
fn test_zero_capacity_rejected() {
    let mut cfg = HospitalConfig::default();
    cfg.capacities.er = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_night_reduction_must_leave_a_room() {
    let mut cfg = HospitalConfig::default();
    cfg.night_surgery_reduction = 5;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_hour_scale_rejected() {
    let mut cfg = HospitalConfig::default();
    cfg.hour_scale_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_planner_window_validation() {
    let mut cfg = HospitalConfig::default();
    cfg.planner.window_start_hour = 18;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_from_json_with_defaults() {
    let cfg = HospitalConfig::from_json_str(
        r#"{"capacities":{"intake":2,"surgery":3,"bed_a":5,"bed_b":6,"er":1},"night_surgery_reduction":1,"seed":7}"#,
    )
    .expect("parse");
    assert_eq!(cfg.capacities.intake, 2);
    assert_eq!(cfg.seed, Some(7));
    assert_eq!(cfg.hour_scale_ms, 1_000);
}

#[test]
fn test_config_from_json_invalid() {
    assert!(HospitalConfig::from_json_str("{not json").is_err());
    assert!(HospitalConfig::from_json_str(r#"{"idle_interval_ms":0}"#).is_err());
}

#[test]
fn test_config_from_lookup_overrides() {
    let cfg = HospitalConfig::from_lookup(lookup(&[
        ("CAPACITY_BED_A", "12"),
        ("BACKPRESSURE_THRESHOLD", "5"),
        ("HOUR_SCALE_MS", " 3 "),
        ("SEED", "42"),
        ("START", "2018-01-08T08:00:00"),
    ]))
    .expect("config");
    assert_eq!(cfg.capacities.bed_a, 12);
    assert_eq!(cfg.backpressure_threshold, 5);
    assert_eq!(cfg.hour_scale_ms, 3);
    assert_eq!(cfg.seed, Some(42));
    assert_eq!(cfg.simulation_start.to_string(), "2018-01-08 08:00:00");
}

#[test]
fn test_config_from_lookup_reports_bad_key() {
    let err = HospitalConfig::from_lookup(lookup(&[("CAPACITY_ER", "many")])).unwrap_err();
    assert!(err.contains("HOSPITAL_SIM_CAPACITY_ER"), "{err}");
}
