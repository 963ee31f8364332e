//! Constraint search for the earliest feasible re-admission slot.
//!
//! Candidates are hour-aligned weekday times inside the working window over a
//! fixed horizon. Each candidate is checked against the intake load and the
//! pending surgery / nursing demand derived from the snapshot list; the
//! earliest candidate passing every check wins.
//!
//! Intervals of running steps are not stored, so each check samples fresh
//! durations from the [`DurationOracle`].

use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};

use crate::config::PlannerConfig;
use crate::core::{
    DurationOracle, RescheduleResult, ResourceStateSnapshot, SimulationError, Task,
};
use crate::util::clock::{ceil_to_hour, hours_delta};
use crate::util::serde::{Diagnosis, PatientId};

/// Which running snapshots count against a pending constraint.
#[derive(Debug, Clone, Copy)]
struct PendingRule {
    task: Task,
    /// `None` counts every diagnosis.
    pending: Option<&'static [Diagnosis]>,
    running: Option<&'static [Diagnosis]>,
    capacity: u32,
}

const NURSING_A_PENDING: &[Diagnosis] = &[Diagnosis::A1];
const NURSING_A_RUNNING: &[Diagnosis] = &Diagnosis::GROUP_A;
const NURSING_B_PENDING: &[Diagnosis] = &[Diagnosis::B1, Diagnosis::B2];
const NURSING_B_RUNNING: &[Diagnosis] = &Diagnosis::GROUP_B;

/// Read-only rescheduler.
pub struct Planner {
    config: PlannerConfig,
    oracle: Arc<dyn DurationOracle>,
}

impl Planner {
    /// Planner sampling durations from `oracle`.
    pub fn new(config: PlannerConfig, oracle: Arc<dyn DurationOracle>) -> Self {
        Self { config, oracle }
    }

    /// Limits in use.
    pub const fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Hour-aligned weekday times in `[reference, reference + horizon)` whose
    /// hour lies in the working window, both ends inclusive.
    pub fn candidate_slots(&self, reference: NaiveDateTime) -> Vec<NaiveDateTime> {
        let end = reference + TimeDelta::days(i64::from(self.config.horizon_days));
        let mut slots = Vec::new();
        let mut t = ceil_to_hour(reference);
        while t < end {
            let weekday = t.weekday().num_days_from_monday() < 5;
            let hour = t.hour();
            if weekday
                && hour >= self.config.window_start_hour
                && hour <= self.config.window_end_hour
            {
                slots.push(t);
            }
            t += TimeDelta::hours(1);
        }
        slots
    }

    /// Earliest feasible slot for a patient.
    ///
    /// # Errors
    ///
    /// [`SimulationError::NoFeasibleSlot`] when no candidate in the horizon
    /// satisfies every constraint.
    pub fn plan(
        &self,
        patient_id: &str,
        reference: NaiveDateTime,
        diagnosis: Option<Diagnosis>,
        snapshots: &[ResourceStateSnapshot],
    ) -> Result<RescheduleResult, SimulationError> {
        let slot = self
            .candidate_slots(reference)
            .into_iter()
            .find(|t| self.is_feasible(*t, snapshots))
            .ok_or(SimulationError::NoFeasibleSlot)?;
        tracing::info!(patient = patient_id, %reference, %slot, "reschedule slot found");
        Ok(RescheduleResult {
            patient_id: PatientId::from(patient_id),
            reschedule_time: slot,
            diagnosis,
            feasible: true,
        })
    }

    /// Whether every constraint holds at `t`.
    pub fn is_feasible(&self, t: NaiveDateTime, snapshots: &[ResourceStateSnapshot]) -> bool {
        if self.intake_load(t, snapshots) >= self.config.intake_capacity {
            return false;
        }
        let aggregate = self.pending_surgery(t, snapshots)
            + self.pending_nursing_a(t, snapshots)
            + self.pending_nursing_b(t, snapshots);
        aggregate <= self.config.aggregate_limit
    }

    /// Intakes whose freshly sampled interval contains `t`.
    pub fn intake_load(&self, t: NaiveDateTime, snapshots: &[ResourceStateSnapshot]) -> u32 {
        let busy = snapshots
            .iter()
            .filter(|s| s.task == Task::Intake)
            .filter(|s| contains(s.start_time, self.oracle.intake_duration(), t))
            .count();
        saturate(busy)
    }

    /// Waiting surgeries, discounted by one when rooms free up by `t`.
    pub fn pending_surgery(&self, t: NaiveDateTime, snapshots: &[ResourceStateSnapshot]) -> u32 {
        self.pending(
            t,
            snapshots,
            PendingRule {
                task: Task::Surgery,
                pending: None,
                running: None,
                capacity: self.config.surgery_capacity,
            },
        )
    }

    /// Waiting A1 nursing stays, discounted by one when group A beds free up.
    pub fn pending_nursing_a(&self, t: NaiveDateTime, snapshots: &[ResourceStateSnapshot]) -> u32 {
        self.pending(
            t,
            snapshots,
            PendingRule {
                task: Task::Nursing,
                pending: Some(NURSING_A_PENDING),
                running: Some(NURSING_A_RUNNING),
                capacity: self.config.nursing_a_capacity,
            },
        )
    }

    /// Waiting B1/B2 nursing stays, discounted by one when group B beds free up.
    pub fn pending_nursing_b(&self, t: NaiveDateTime, snapshots: &[ResourceStateSnapshot]) -> u32 {
        self.pending(
            t,
            snapshots,
            PendingRule {
                task: Task::Nursing,
                pending: Some(NURSING_B_PENDING),
                running: Some(NURSING_B_RUNNING),
                capacity: self.config.nursing_b_capacity,
            },
        )
    }

    fn pending(&self, t: NaiveDateTime, snapshots: &[ResourceStateSnapshot], rule: PendingRule) -> u32 {
        let in_set = |s: &ResourceStateSnapshot, set: Option<&[Diagnosis]>| {
            set.is_none_or(|set| s.diagnosis.is_some_and(|d| set.contains(&d)))
        };
        let pending = saturate(
            snapshots
                .iter()
                .filter(|s| s.task == rule.task && s.waiting && in_set(s, rule.pending))
                .count(),
        );
        if pending < 2 {
            return pending;
        }
        let running = saturate(
            snapshots
                .iter()
                .filter(|s| s.task == rule.task && !s.waiting && in_set(s, rule.running))
                .filter(|s| contains(s.start_time, self.running_duration(rule.task, s.diagnosis), t))
                .count(),
        );
        if running < rule.capacity {
            pending - 1
        } else {
            pending
        }
    }

    fn running_duration(&self, task: Task, diagnosis: Option<Diagnosis>) -> f64 {
        let Some(diagnosis) = diagnosis else {
            return 0.0;
        };
        let sampled = match task {
            Task::Surgery => self.oracle.operation_duration(diagnosis),
            Task::Nursing => self.oracle.nursing_duration(diagnosis),
            _ => Ok(0.0),
        };
        sampled.unwrap_or(0.0)
    }
}

fn contains(start: NaiveDateTime, hours: f64, t: NaiveDateTime) -> bool {
    start <= t && t < start + hours_delta(hours)
}

fn saturate(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
