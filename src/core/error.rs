//! Error types for engine operations.

use thiserror::Error;

use crate::util::serde::ResourceKind;

/// Errors produced by engine components.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Backing store failed; the mutation must be assumed not applied.
    #[error("store error: {0}")]
    Store(String),
    /// No live state for the patient.
    #[error("unknown patient: {0}")]
    UnknownPatient(String),
    /// Request cannot be served as issued.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Capacity change would break `0 <= available <= capacity`.
    #[error("invalid capacity change for {resource}: {reason}")]
    InvalidCapacity {
        /// Resource being changed.
        resource: ResourceKind,
        /// Why the change was refused.
        reason: String,
    },
    /// Diagnosis code not covered by the duration tables.
    #[error("unknown diagnosis: {0}")]
    UnknownDiagnosis(String),
    /// Rescheduler found no slot inside the planning horizon.
    #[error("no feasible slot")]
    NoFeasibleSlot,
    /// Outcome could not be pushed to the orchestrator.
    #[error("delivery error: {0}")]
    Delivery(String),
    /// Configuration rejected.
    #[error("config error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for SimulationError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
