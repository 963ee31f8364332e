//! Per-patient resource-state snapshots consulted by the rescheduler.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::util::serde::{Diagnosis, PatientId};

/// Step a patient is currently in or waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    /// Admitted, intake not yet started.
    #[serde(rename = "Patient Admission")]
    PatientAdmission,
    /// Intake in progress.
    Intake,
    /// Waiting for or in surgery.
    Surgery,
    /// Waiting for or in a nursing bed.
    Nursing,
    /// Waiting for or in ER treatment.
    #[serde(rename = "ER Treatment")]
    ErTreatment,
}

impl Task {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PatientAdmission => "Patient Admission",
            Self::Intake => "Intake",
            Self::Surgery => "Surgery",
            Self::Nursing => "Nursing",
            Self::ErTreatment => "ER Treatment",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where one patient stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStateSnapshot {
    /// Patient described.
    pub patient_id: PatientId,
    /// Current step.
    pub task: Task,
    /// Simulated time the step started (or the request was queued).
    pub start_time: NaiveDateTime,
    /// Diagnosis known so far.
    pub diagnosis: Option<Diagnosis>,
    /// Queued rather than occupying the resource.
    pub waiting: bool,
}

/// Registry of live snapshots, one per admitted patient.
#[derive(Default)]
pub struct SystemState {
    patients: RwLock<HashMap<PatientId, ResourceStateSnapshot>>,
}

impl SystemState {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh admission.
    pub fn admit(&self, patient_id: &str, diagnosis: Option<Diagnosis>, at: NaiveDateTime) {
        self.patients.write().insert(
            patient_id.to_owned(),
            ResourceStateSnapshot {
                patient_id: patient_id.to_owned(),
                task: Task::PatientAdmission,
                start_time: at,
                diagnosis,
                waiting: false,
            },
        );
    }

    /// Move a patient to a new step, creating the snapshot if missing.
    ///
    /// A `None` diagnosis keeps the one already recorded.
    pub fn begin(
        &self,
        patient_id: &str,
        task: Task,
        diagnosis: Option<Diagnosis>,
        at: NaiveDateTime,
        waiting: bool,
    ) {
        let mut patients = self.patients.write();
        let snapshot = patients
            .entry(patient_id.to_owned())
            .or_insert_with(|| ResourceStateSnapshot {
                patient_id: patient_id.to_owned(),
                task,
                start_time: at,
                diagnosis,
                waiting,
            });
        snapshot.task = task;
        snapshot.start_time = at;
        snapshot.waiting = waiting;
        if diagnosis.is_some() {
            snapshot.diagnosis = diagnosis;
        }
    }

    /// Move an admitted patient into intake.
    ///
    /// Returns the task the patient was in when it was not
    /// [`Task::PatientAdmission`]; `None` when no snapshot exists. Nothing
    /// changes unless the result is `Some(Ok(()))`.
    pub fn start_intake(
        &self,
        patient_id: &str,
        diagnosis: Diagnosis,
        at: NaiveDateTime,
    ) -> Option<Result<(), Task>> {
        let mut patients = self.patients.write();
        let snapshot = patients.get_mut(patient_id)?;
        if snapshot.task != Task::PatientAdmission {
            return Some(Err(snapshot.task));
        }
        snapshot.task = Task::Intake;
        snapshot.start_time = at;
        snapshot.waiting = false;
        snapshot.diagnosis = Some(diagnosis);
        Some(Ok(()))
    }

    /// Put back what [`get`](Self::get) returned earlier; `None` removes the
    /// patient.
    pub fn restore(&self, patient_id: &str, previous: Option<ResourceStateSnapshot>) {
        let mut patients = self.patients.write();
        match previous {
            Some(snapshot) => {
                patients.insert(patient_id.to_owned(), snapshot);
            }
            None => {
                patients.remove(patient_id);
            }
        }
    }

    /// A queued patient starts occupying its resource.
    pub fn mark_running(&self, patient_id: &str, at: NaiveDateTime) -> bool {
        match self.patients.write().get_mut(patient_id) {
            Some(snapshot) => {
                snapshot.waiting = false;
                snapshot.start_time = at;
                true
            }
            None => false,
        }
    }

    /// Drop a patient's snapshot.
    pub fn release(&self, patient_id: &str) -> Option<ResourceStateSnapshot> {
        self.patients.write().remove(patient_id)
    }

    /// Snapshot of one patient.
    pub fn get(&self, patient_id: &str) -> Option<ResourceStateSnapshot> {
        self.patients.read().get(patient_id).cloned()
    }

    /// Point-in-time copy ordered by start time, then patient id.
    pub fn snapshot(&self) -> Vec<ResourceStateSnapshot> {
        let mut all: Vec<_> = self.patients.read().values().cloned().collect();
        all.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.patient_id.cmp(&b.patient_id))
        });
        all
    }

    /// Live snapshots.
    pub fn len(&self) -> usize {
        self.patients.read().len()
    }

    /// Whether no patient is tracked.
    pub fn is_empty(&self) -> bool {
        self.patients.read().is_empty()
    }
}
