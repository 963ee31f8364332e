//! Serializable domain primitives shared by every layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::SimulationError;

/// Patient identifier as supplied by the orchestrator or generated on arrival.
pub type PatientId = String;

/// Opaque reference used to push an outcome back to the orchestrator
/// (a callback URL in the reference deployment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackRef(pub String);

impl CallbackRef {
    /// Wrap any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh patient identifier.
pub fn generate_patient_id() -> PatientId {
    uuid::Uuid::new_v4().to_string()
}

/// Arrival class of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatientType {
    /// Emergency arrival, admitted unconditionally.
    #[serde(rename = "ER")]
    Er,
    /// Planned arrival, subject to admission control.
    Planned,
}

/// Diagnosis family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosisGroup {
    /// Diagnoses `A1..A4`, nursed in bed class A.
    A,
    /// Diagnoses `B1..B4`, nursed in bed class B.
    B,
}

/// Diagnosis code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Diagnosis {
    A1,
    A2,
    A3,
    A4,
    B1,
    B2,
    B3,
    B4,
}

impl Diagnosis {
    /// All diagnosis codes of group A, in table order.
    pub const GROUP_A: [Self; 4] = [Self::A1, Self::A2, Self::A3, Self::A4];
    /// All diagnosis codes of group B, in table order.
    pub const GROUP_B: [Self; 4] = [Self::B1, Self::B2, Self::B3, Self::B4];

    /// Family this diagnosis belongs to.
    pub const fn group(self) -> DiagnosisGroup {
        match self {
            Self::A1 | Self::A2 | Self::A3 | Self::A4 => DiagnosisGroup::A,
            Self::B1 | Self::B2 | Self::B3 | Self::B4 => DiagnosisGroup::B,
        }
    }

    /// Code as exchanged with the orchestrator.
    pub const fn code(self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::B3 => "B3",
            Self::B4 => "B4",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Diagnosis {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A1" => Ok(Self::A1),
            "A2" => Ok(Self::A2),
            "A3" => Ok(Self::A3),
            "A4" => Ok(Self::A4),
            "B1" => Ok(Self::B1),
            "B2" => Ok(Self::B2),
            "B3" => Ok(Self::B3),
            "B4" => Ok(Self::B4),
            other => Err(SimulationError::UnknownDiagnosis(other.to_string())),
        }
    }
}

/// Patient status strings exchanged with the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatientStatus {
    /// Admission accepted.
    #[serde(rename = "patient admitted")]
    Admitted,
    /// Admission rejected.
    #[serde(rename = "sent home")]
    SentHome,
    /// Intake step done.
    #[serde(rename = "Intake finished")]
    IntakeFinished,
    /// Surgery step done.
    #[serde(rename = "Surgery finished")]
    SurgeryFinished,
    /// Nursing step done.
    #[serde(rename = "Nursing finished")]
    NursingFinished,
    /// ER treatment done. Entries carrying this status jump ahead in queues.
    #[serde(rename = "ER Treatment finished")]
    ErTreatmentFinished,
}

impl PatientStatus {
    /// Wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admitted => "patient admitted",
            Self::SentHome => "sent home",
            Self::IntakeFinished => "Intake finished",
            Self::SurgeryFinished => "Surgery finished",
            Self::NursingFinished => "Nursing finished",
            Self::ErTreatmentFinished => "ER Treatment finished",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded physical resource classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Intake staff.
    Intake,
    /// Surgery rooms.
    Surgery,
    /// Nursing beds for group A.
    BedA,
    /// Nursing beds for group B.
    BedB,
    /// Emergency room slots.
    #[serde(rename = "ER")]
    Er,
}

impl ResourceKind {
    /// Every pooled resource.
    pub const ALL: [Self; 5] = [Self::Intake, Self::Surgery, Self::BedA, Self::BedB, Self::Er];

    /// Stable storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "Intake",
            Self::Surgery => "Surgery",
            Self::BedA => "Bed_A",
            Self::BedB => "Bed_B",
            Self::Er => "ER",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queued resources. Intake is never queued; admission rejects instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueueName {
    /// Waiting for a surgery room.
    Surgery,
    /// Waiting for a group A bed.
    NursingA,
    /// Waiting for a group B bed.
    NursingB,
    /// Waiting for an ER slot.
    Er,
}

impl QueueName {
    /// Every queue, in processor start order.
    pub const ALL: [Self; 4] = [Self::Surgery, Self::NursingA, Self::NursingB, Self::Er];

    /// Queues counted by the admission backpressure rule.
    pub const BACKPRESSURE: [Self; 3] = [Self::Surgery, Self::NursingA, Self::NursingB];

    /// Pool drained by this queue.
    pub const fn resource(self) -> ResourceKind {
        match self {
            Self::Surgery => ResourceKind::Surgery,
            Self::NursingA => ResourceKind::BedA,
            Self::NursingB => ResourceKind::BedB,
            Self::Er => ResourceKind::Er,
        }
    }

    /// Nursing queue serving a diagnosis group.
    pub const fn nursing_for(group: DiagnosisGroup) -> Self {
        match group {
            DiagnosisGroup::A => Self::NursingA,
            DiagnosisGroup::B => Self::NursingB,
        }
    }

    /// Stable storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Surgery => "Queue_Surgery",
            Self::NursingA => "Queue_Nursing_A",
            Self::NursingB => "Queue_Nursing_B",
            Self::Er => "Queue_ER",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
