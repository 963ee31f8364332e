//! Outcome payloads pushed to the orchestrator and the mailbox abstraction.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::SimulationError;
use crate::util::clock::round2;
use crate::util::serde::{CallbackRef, Diagnosis, PatientId, PatientStatus};

/// Result of an admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionOutcome {
    /// `patient admitted` or `sent home`.
    pub status: PatientStatus,
    /// Supplied or generated identifier.
    pub patient_id: PatientId,
    /// Arrival time echoed back.
    pub arrival_time: NaiveDateTime,
}

impl AdmissionOutcome {
    /// Whether the patient was admitted.
    pub fn is_admitted(&self) -> bool {
        self.status == PatientStatus::Admitted
    }
}

/// Completion of a treatment step. Queued and direct service produce the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCompletion {
    /// `<Step> finished`.
    pub status: PatientStatus,
    /// Simulated hours, waiting included, rounded to two decimals.
    pub duration: f64,
    /// Intake and ER: whether the diagnosis needs an operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_surgery: Option<bool>,
    /// Nursing: whether the patient can leave without complication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<bool>,
    /// ER: complaint had no underlying cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phantom_pain: Option<bool>,
    /// ER: diagnosis assigned during treatment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
}

impl StepCompletion {
    /// Completion with only status and duration set.
    pub fn new(status: PatientStatus, duration: f64) -> Self {
        Self {
            status,
            duration: round2(duration),
            require_surgery: None,
            release: None,
            phantom_pain: None,
            diagnosis: None,
        }
    }
}

/// A popped request that could not be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// `<Step> failed`.
    pub status: String,
    /// Human-readable cause.
    pub reason: String,
}

/// Offered re-admission time, or the fallback when no slot exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleResult {
    /// Patient being rescheduled.
    pub patient_id: PatientId,
    /// ISO-8601 timestamp of the offered slot.
    pub reschedule_time: NaiveDateTime,
    /// Diagnosis carried through.
    pub diagnosis: Option<Diagnosis>,
    /// `false` when the planner found no slot and the arrival time is echoed.
    pub feasible: bool,
}

/// Anything pushed to a callback reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notification {
    /// Admission decision.
    Admission(AdmissionOutcome),
    /// Step completed.
    StepFinished(StepCompletion),
    /// Step could not be served.
    StepFailed(StepFailure),
    /// Reschedule offer.
    Reschedule(RescheduleResult),
}

/// Abstraction for outcome delivery to the orchestrator.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Push one notification to a callback reference.
    async fn deliver(
        &self,
        callback: &CallbackRef,
        notification: Notification,
    ) -> Result<(), SimulationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_omits_unset_fields() {
        let completion = StepCompletion::new(PatientStatus::SurgeryFinished, 1.23456);
        let json = serde_json::to_value(&completion).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "Surgery finished", "duration": 1.23})
        );
    }

    #[test]
    fn test_admission_wire_shape() {
        let outcome = AdmissionOutcome {
            status: PatientStatus::SentHome,
            patient_id: "p1".into(),
            arrival_time: chrono::NaiveDate::from_ymd_opt(2018, 1, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };
        let json = serde_json::to_value(Notification::Admission(outcome)).unwrap();
        assert_eq!(json["status"], "sent home");
        assert_eq!(json["arrival_time"], "2018-01-01T09:30:00");
    }
}
