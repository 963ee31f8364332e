//! Core engine: resource accounting, queues, processors, admission and planning.

pub mod admission;
pub mod clock;
pub mod error;
pub mod hospital;
pub mod notification;
pub mod oracle;
pub mod planner;
pub mod processor;
pub mod resource_pool;
pub mod resource_queue;
pub mod snapshot;

pub use admission::{AdmissionController, Arrival};
pub use clock::{Regime, SimulationClock};
pub use error::{AppResult, SimulationError};
pub use hospital::{Hospital, RescheduleRequest, StepRequest, StepResponse};
pub use notification::{
    AdmissionOutcome, Mailbox, Notification, RescheduleResult, StepCompletion, StepFailure,
};
pub use oracle::{DurationOracle, StochasticOracle};
pub use planner::Planner;
pub use processor::{failure_status, sample_service, QueueProcessor, ServicePlan, Spawn};
pub use resource_pool::{ResourcePool, ResourceState, ResourceStore};
pub use resource_queue::{prioritize, Placement, QueueEntry, QueueSet, QueuedRequest, ResourceQueue};
pub use snapshot::{ResourceStateSnapshot, SystemState, Task};
