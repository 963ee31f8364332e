//! Tests for shared utilities

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use hospital_capacity_sim::util::clock::{
    ceil_to_hour, is_working_hour, next_non_working_hour, next_working_hour, round2,
    scaled_sleep,
};
use hospital_capacity_sim::util::serde::{
    generate_patient_id, CallbackRef, Diagnosis, DiagnosisGroup, PatientStatus, QueueName,
    ResourceKind,
};

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    // January 2018: the 1st is a Monday.
    NaiveDate::from_ymd_opt(2018, 1, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[test]
fn test_working_window_is_inclusive() {
    assert!(is_working_hour(at(1, 8, 0)));
    assert!(is_working_hour(at(1, 17, 0)));
    assert!(!is_working_hour(at(1, 17, 1)));
    assert!(!is_working_hour(at(6, 10, 0)));
}

#[test]
fn test_regime_boundaries() {
    assert_eq!(next_working_hour(at(1, 6, 0)), at(1, 8, 0));
    assert_eq!(next_working_hour(at(1, 18, 0)), at(2, 8, 0));
    assert_eq!(next_working_hour(at(6, 9, 0)), at(8, 8, 0));
    assert_eq!(next_non_working_hour(at(3, 9, 0)), at(3, 17, 1));
}

#[test]
fn test_ceil_to_hour() {
    assert_eq!(ceil_to_hour(at(1, 10, 0)), at(1, 10, 0));
    assert_eq!(ceil_to_hour(at(1, 10, 1)), at(1, 11, 0));
}

#[test]
fn test_scaled_sleep_and_rounding() {
    assert_eq!(scaled_sleep(1.5, Duration::from_secs(1)), Duration::from_millis(1500));
    assert_eq!(scaled_sleep(-1.0, Duration::from_millis(10)), Duration::ZERO);
    assert!((round2(1.23456) - 1.23).abs() < f64::EPSILON);
}

#[test]
fn test_diagnosis_parsing_and_groups() {
    assert_eq!("A3".parse::<Diagnosis>().unwrap(), Diagnosis::A3);
    assert_eq!(" B1 ".parse::<Diagnosis>().unwrap(), Diagnosis::B1);
    assert!("C1".parse::<Diagnosis>().is_err());
    assert_eq!(Diagnosis::B4.group(), DiagnosisGroup::B);
    assert!(Diagnosis::GROUP_A.iter().all(|d| d.group() == DiagnosisGroup::A));
}

#[test]
fn test_names_exchanged_with_orchestrator() {
    assert_eq!(ResourceKind::BedA.as_str(), "Bed_A");
    assert_eq!(QueueName::Er.as_str(), "Queue_ER");
    assert_eq!(QueueName::NursingA.resource(), ResourceKind::BedA);
    assert_eq!(QueueName::nursing_for(DiagnosisGroup::B), QueueName::NursingB);
    assert_eq!(PatientStatus::IntakeFinished.to_string(), "Intake finished");
    assert_eq!(CallbackRef::new("cb").to_string(), "cb");
}

#[test]
fn test_generated_patient_ids_are_unique() {
    let a = generate_patient_id();
    let b = generate_patient_id();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}
