//! Configuration models for capacities, timing and the rescheduler.

pub mod hospital;

pub use hospital::{HospitalConfig, PlannerConfig, ResourceCapacities, ENV_PREFIX};
