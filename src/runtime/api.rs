//! Read models describing the engine for the orchestrator and operators.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::{Hospital, Regime, ResourceState, SimulationError};
use crate::util::serde::QueueName;

/// Length of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOverview {
    /// Queue identity.
    pub name: QueueName,
    /// Entries waiting.
    pub waiting: usize,
}

/// Point-in-time view of the whole engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalOverview {
    /// Current simulated time.
    pub time: NaiveDateTime,
    /// Regime in force.
    pub regime: Regime,
    /// Every pooled resource.
    pub resources: Vec<ResourceState>,
    /// Every managed queue.
    pub queues: Vec<QueueOverview>,
    /// Patients with a live snapshot.
    pub patients: usize,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Failure description when unhealthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Collect an overview of the engine.
///
/// # Errors
///
/// Store failures.
pub fn overview(hospital: &Hospital) -> Result<HospitalOverview, SimulationError> {
    let queues = QueueName::ALL
        .iter()
        .map(|name| {
            hospital.queues().get(*name).len().map(|waiting| QueueOverview {
                name: *name,
                waiting,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HospitalOverview {
        time: hospital.clock().now(),
        regime: hospital.clock().regime(),
        resources: hospital.resource_states()?,
        queues,
        patients: hospital.state().len(),
    })
}

/// Healthy when the store answers and every resource is within bounds.
pub fn health(hospital: &Hospital) -> Health {
    match hospital.resource_states() {
        Ok(states) => match states.iter().find(|s| s.available > s.capacity) {
            Some(bad) => Health {
                ok: false,
                reason: Some(format!("{} has {} of {} available", bad.name, bad.available, bad.capacity)),
            },
            None => Health { ok: true, reason: None },
        },
        Err(err) => Health {
            ok: false,
            reason: Some(err.to_string()),
        },
    }
}
