//! Runtime adapters and the read-only API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod driver;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{health, overview, Health, HospitalOverview, QueueOverview};
#[cfg(feature = "tokio-runtime")]
pub use driver::{DriverReport, PathwayOutcome, SimulationDriver};
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
