//! Admission control with intake-availability backpressure.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::{AdmissionOutcome, QueueSet, ResourcePool, SimulationError, SystemState};
use crate::util::serde::{
    generate_patient_id, CallbackRef, Diagnosis, PatientId, PatientStatus, PatientType, QueueName,
    ResourceKind,
};

/// One arriving patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrival {
    /// ER or planned.
    pub patient_type: PatientType,
    /// Identifier, if the patient brought one.
    pub patient_id: Option<PatientId>,
    /// Diagnosis of a planned patient.
    pub diagnosis: Option<Diagnosis>,
    /// Simulated arrival time.
    pub arrival_time: NaiveDateTime,
    /// Where the admission outcome is delivered.
    pub callback: CallbackRef,
}

impl Arrival {
    /// Identifier with blank strings treated as missing.
    pub fn supplied_id(&self) -> Option<&str> {
        self.patient_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Admit / reject policy.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionController {
    threshold: usize,
}

impl AdmissionController {
    /// Reject planned arrivals once more than `threshold` patients sit
    /// between intake and their next step.
    pub const fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Configured backpressure threshold.
    pub const fn threshold(&self) -> usize {
        self.threshold
    }

    /// Decide on an arrival, reserving an intake unit and recording the
    /// snapshot when the patient is admitted.
    ///
    /// # Errors
    ///
    /// Store failures; no intake unit is held and no snapshot exists then.
    pub fn admit(
        &self,
        arrival: &Arrival,
        pool: &ResourcePool,
        queues: &QueueSet,
        state: &SystemState,
    ) -> Result<AdmissionOutcome, SimulationError> {
        let supplied = arrival.supplied_id().map(str::to_owned);
        let (status, patient_id) = match (arrival.patient_type, supplied) {
            (PatientType::Er, id) => (
                PatientStatus::Admitted,
                id.unwrap_or_else(generate_patient_id),
            ),
            (PatientType::Planned, None) => (PatientStatus::SentHome, generate_patient_id()),
            (PatientType::Planned, Some(id)) => (self.decide_planned(pool, queues)?, id),
        };

        if status == PatientStatus::Admitted {
            state.admit(&patient_id, arrival.diagnosis, arrival.arrival_time);
        }
        tracing::info!(
            patient = %patient_id,
            kind = ?arrival.patient_type,
            %status,
            "admission decided"
        );
        Ok(AdmissionOutcome {
            status,
            patient_id,
            arrival_time: arrival.arrival_time,
        })
    }

    /// The backpressure count and the intake acquire run under the intake
    /// lock, so concurrent admissions see the count one after the other.
    fn decide_planned(
        &self,
        pool: &ResourcePool,
        queues: &QueueSet,
    ) -> Result<PatientStatus, SimulationError> {
        let mut pressured = false;
        let admitted = pool.acquire_when(ResourceKind::Intake, || {
            let pending =
                queues.count_with_status(&QueueName::BACKPRESSURE, PatientStatus::IntakeFinished)?;
            pressured = pending > self.threshold;
            if pressured {
                tracing::debug!(pending, threshold = self.threshold, "backpressure: sending home");
            }
            Ok(!pressured)
        })?;
        if !admitted && !pressured {
            tracing::debug!("no intake staff free: sending home");
        }
        Ok(if admitted {
            PatientStatus::Admitted
        } else {
            PatientStatus::SentHome
        })
    }
}
