//! Builders to construct the engine from configuration.

pub mod hospital_builder;

pub use hospital_builder::HospitalBuilder;
