//! Builder assembling a [`Hospital`] from configuration and collaborators.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::HospitalConfig;
use crate::core::{DurationOracle, Hospital, Mailbox, ResourceStore, SimulationError, StochasticOracle};
use crate::infra::{InMemoryMailbox, InMemoryResourceStore};

/// Collects collaborators; anything not supplied falls back to the in-memory
/// store, the seeded stochastic oracle and an in-memory mailbox.
pub struct HospitalBuilder {
    config: HospitalConfig,
    store: Option<Arc<dyn ResourceStore>>,
    oracle: Option<Arc<dyn DurationOracle>>,
    mailbox: Option<Arc<dyn Mailbox>>,
}

impl HospitalBuilder {
    /// Start from a configuration.
    pub const fn new(config: HospitalConfig) -> Self {
        Self {
            config,
            store: None,
            oracle: None,
            mailbox: None,
        }
    }

    /// Use a specific resource store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific duration oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn DurationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Deliver outcomes through `mailbox`.
    #[must_use]
    pub fn with_mailbox(mut self, mailbox: Arc<dyn Mailbox>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Override the simulated start time.
    #[must_use]
    pub fn starting_at(mut self, start: NaiveDateTime) -> Self {
        self.config.simulation_start = start;
        self
    }

    /// Override the real length of one simulated hour.
    #[must_use]
    pub fn hour_scale_ms(mut self, millis: u64) -> Self {
        self.config.hour_scale_ms = millis;
        self
    }

    /// Validate and assemble the engine.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Config`] for invalid configuration, or store
    /// failures while seeding capacities.
    pub fn build(self) -> Result<Hospital, SimulationError> {
        let seed = self.config.seed;
        let store: Arc<dyn ResourceStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryResourceStore::new()),
        };
        let oracle: Arc<dyn DurationOracle> = match self.oracle {
            Some(oracle) => oracle,
            None => Arc::new(StochasticOracle::new(seed)),
        };
        let mailbox: Arc<dyn Mailbox> = match self.mailbox {
            Some(mailbox) => mailbox,
            None => Arc::new(InMemoryMailbox::new()),
        };
        Hospital::new(self.config, store, oracle, mailbox)
    }
}
