//! # Hospital Capacity Simulation
//!
//! Resource-allocation and queueing core for a discrete hospital simulation.
//!
//! Patients arrive either as planned admissions or through the emergency
//! room. The engine decides whether a planned patient is admitted or sent
//! home, serves intake, surgery, nursing and ER treatment against pooled
//! staff, beds and rooms, and parks requests in persistent queues when a
//! resource is exhausted. A processor per queue wakes when capacity returns,
//! serves the head of its queue and delivers the outcome to the requester's
//! mailbox.
//!
//! ## Key Features
//!
//! - **Resource pool**: available units per resource, never below zero and
//!   never above capacity
//! - **Priority queues**: FIFO with ER patients moved ahead of planned ones
//! - **Backpressure**: planned patients are sent home while intake work piles up
//! - **Day/night regime**: surgery capacity shrinks outside working hours
//! - **Rescheduler**: earliest feasible weekday slot for sent-home patients
//! - **Stores**: in-memory or `SQLite`, behind one trait
//!
//! ```rust,ignore
//! use hospital_capacity_sim::builders::HospitalBuilder;
//! use hospital_capacity_sim::config::HospitalConfig;
//! use hospital_capacity_sim::runtime::TokioSpawner;
//!
//! let hospital = HospitalBuilder::new(HospitalConfig::default()).build()?;
//! hospital.start_processors(&TokioSpawner::current());
//! let outcome = hospital.admit(&arrival).await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core engine: pool, queues, processors, admission and planning.
pub mod core;
/// Configuration models for capacities, timing and the rescheduler.
pub mod config;
/// Builders to assemble the engine from configuration.
pub mod builders;
/// Infrastructure adapters for stores, mailboxes and the arrival feed.
pub mod infra;
/// Runtime adapters, the simulation driver and the read API.
pub mod runtime;
/// Shared utilities.
pub mod util;
