//! Rescheduler tests over hand-built snapshot lists.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use hospital_capacity_sim::config::PlannerConfig;
use hospital_capacity_sim::core::oracle::is_surgical;
use hospital_capacity_sim::core::{
    DurationOracle, Planner, ResourceStateSnapshot, SimulationError, StochasticOracle, Task,
};
use hospital_capacity_sim::util::serde::{Diagnosis, DiagnosisGroup};

/// Intake 1h, operations 2h, nursing 3h.
struct FixedOracle;

impl DurationOracle for FixedOracle {
    fn operation_duration(&self, diagnosis: Diagnosis) -> Result<f64, SimulationError> {
        if is_surgical(diagnosis) {
            Ok(2.0)
        } else {
            Err(SimulationError::UnknownDiagnosis(diagnosis.to_string()))
        }
    }

    fn nursing_duration(&self, _diagnosis: Diagnosis) -> Result<f64, SimulationError> {
        Ok(3.0)
    }

    fn intake_duration(&self) -> f64 {
        1.0
    }

    fn er_treatment_duration(&self) -> f64 {
        2.0
    }

    fn requires_surgery(&self, diagnosis: Diagnosis) -> bool {
        is_surgical(diagnosis)
    }

    fn has_complication(&self, _diagnosis: Diagnosis) -> bool {
        false
    }

    fn assign_diagnosis(&self, _group: Option<DiagnosisGroup>) -> Diagnosis {
        Diagnosis::A1
    }

    fn phantom_pain(&self) -> bool {
        false
    }
}

fn planner() -> Planner {
    Planner::new(PlannerConfig::default(), Arc::new(FixedOracle))
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    // January 2018: the 1st is a Monday.
    NaiveDate::from_ymd_opt(2018, 1, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn snap(
    id: String,
    task: Task,
    diagnosis: Option<Diagnosis>,
    start: NaiveDateTime,
    waiting: bool,
) -> ResourceStateSnapshot {
    ResourceStateSnapshot {
        patient_id: id,
        task,
        start_time: start,
        diagnosis,
        waiting,
    }
}

#[test]
fn test_full_intake_pushes_to_next_hour() {
    let snapshots: Vec<_> = (0..4)
        .map(|i| snap(format!("i-{i}"), Task::Intake, None, at(1, 10, 0), false))
        .collect();
    let planner = planner();
    assert_eq!(planner.intake_load(at(1, 10, 0), &snapshots), 4);

    let result = planner
        .plan("p", at(1, 10, 0), Some(Diagnosis::A2), &snapshots)
        .unwrap();
    assert_eq!(result.reschedule_time, at(1, 11, 0));
    assert!(result.feasible);
}

#[test]
fn test_surgery_backlog_clears_when_rooms_free() {
    let mut snapshots: Vec<_> = (0..3)
        .map(|i| snap(format!("w-{i}"), Task::Surgery, Some(Diagnosis::A2), at(1, 9, 0), true))
        .collect();
    snapshots.extend(
        (0..5).map(|i| snap(format!("r-{i}"), Task::Surgery, Some(Diagnosis::A2), at(1, 10, 0), false)),
    );
    let planner = planner();
    assert_eq!(planner.pending_surgery(at(1, 10, 0), &snapshots), 3);
    assert_eq!(planner.pending_surgery(at(1, 12, 0), &snapshots), 2);

    let result = planner.plan("p", at(1, 10, 0), None, &snapshots).unwrap();
    assert_eq!(result.reschedule_time, at(1, 12, 0));
}

#[test]
fn test_idle_rooms_discount_three_waiting_surgeries() {
    let snapshots: Vec<_> = (0..3)
        .map(|i| snap(format!("w-{i}"), Task::Surgery, Some(Diagnosis::A2), at(1, 9, 0), true))
        .collect();
    let planner = planner();
    // No room is busy, so one waiting surgery is expected to start right away.
    assert_eq!(planner.pending_surgery(at(1, 10, 0), &snapshots), 2);
    assert!(planner.is_feasible(at(1, 10, 0), &snapshots));

    let result = planner
        .plan("p", at(1, 10, 0), Some(Diagnosis::A2), &snapshots)
        .unwrap();
    assert_eq!(result.reschedule_time, at(1, 10, 0));
    assert!(result.feasible);
}

#[test]
fn test_nursing_b_backlog_counts_only_b1_b2() {
    let mut snapshots: Vec<_> = (0..3)
        .map(|i| snap(format!("w-{i}"), Task::Nursing, Some(Diagnosis::B1), at(1, 9, 0), true))
        .collect();
    snapshots.push(snap("w-b3".into(), Task::Nursing, Some(Diagnosis::B3), at(1, 9, 0), true));
    snapshots.extend(
        (0..40).map(|i| snap(format!("r-{i}"), Task::Nursing, Some(Diagnosis::B3), at(1, 10, 0), false)),
    );
    let planner = planner();
    assert_eq!(planner.pending_nursing_b(at(1, 10, 0), &snapshots), 3);
    assert_eq!(planner.pending_nursing_a(at(1, 10, 0), &snapshots), 0);

    let result = planner.plan("p", at(1, 10, 0), None, &snapshots).unwrap();
    assert_eq!(result.reschedule_time, at(1, 13, 0));
}

#[test]
fn test_aggregate_over_limit_everywhere_is_infeasible() {
    let mut snapshots: Vec<_> = (0..3)
        .map(|i| snap(format!("w-{i}"), Task::Surgery, Some(Diagnosis::A4), at(1, 9, 0), true))
        .collect();
    snapshots.push(snap("n".into(), Task::Nursing, Some(Diagnosis::A1), at(1, 9, 0), true));

    let err = planner()
        .plan("p", at(1, 10, 0), Some(Diagnosis::A1), &snapshots)
        .unwrap_err();
    assert!(matches!(err, SimulationError::NoFeasibleSlot));
}

#[test]
fn test_weekend_reference_moves_to_monday_morning() {
    let result = planner().plan("p", at(6, 10, 0), None, &[]).unwrap();
    assert_eq!(result.reschedule_time, at(8, 8, 0));
}

#[test]
fn test_unaligned_reference_is_never_earlier() {
    let result = planner().plan("p", at(1, 10, 30), None, &[]).unwrap();
    assert_eq!(result.reschedule_time, at(1, 11, 0));
}

#[test]
fn test_evening_reference_moves_to_next_morning() {
    let result = planner().plan("p", at(1, 17, 30), None, &[]).unwrap();
    assert_eq!(result.reschedule_time, at(2, 8, 0));
}

#[test]
fn test_stochastic_oracle_keeps_result_in_window() {
    let planner = Planner::new(
        PlannerConfig::default(),
        Arc::new(StochasticOracle::new(Some(11))),
    );
    let snapshots: Vec<_> = (0..4)
        .map(|i| snap(format!("i-{i}"), Task::Intake, None, at(1, 10, 0), false))
        .collect();
    let result = planner.plan("p", at(1, 10, 0), None, &snapshots).unwrap();
    assert!(result.reschedule_time == at(1, 11, 0) || result.reschedule_time == at(1, 12, 0));
}
