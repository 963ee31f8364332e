//! Simulated time and the working / non-working capacity regime.

use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::core::{ResourcePool, ResourceState, SimulationError};
use crate::util::clock::{hours_delta, is_working_hour};
use crate::util::serde::ResourceKind;

/// Capacity regime of the hospital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Weekday 08:00 to 17:00; full surgery capacity.
    Working,
    /// Nights and weekends; reduced surgery capacity.
    NonWorking,
}

impl Regime {
    /// Regime in force at a simulated time.
    pub fn at(t: NaiveDateTime) -> Self {
        if is_working_hour(t) {
            Self::Working
        } else {
            Self::NonWorking
        }
    }
}

struct ClockState {
    anchor_sim: NaiveDateTime,
    anchor_real: Instant,
    regime: Regime,
}

/// Maps real elapsed time onto simulated hours and owns the regime toggle.
pub struct SimulationClock {
    hour_scale: Duration,
    state: Mutex<ClockState>,
}

impl SimulationClock {
    /// Clock reading `start` now, in the working regime the pool is built with.
    pub fn new(start: NaiveDateTime, hour_scale: Duration) -> Self {
        Self {
            hour_scale,
            state: Mutex::new(ClockState {
                anchor_sim: start,
                anchor_real: Instant::now(),
                regime: Regime::Working,
            }),
        }
    }

    /// Real duration of one simulated hour.
    pub const fn hour_scale(&self) -> Duration {
        self.hour_scale
    }

    /// Current simulated time.
    pub fn now(&self) -> NaiveDateTime {
        let state = self.state.lock();
        let hours = state.anchor_real.elapsed().as_secs_f64() / self.hour_scale.as_secs_f64();
        state.anchor_sim + hours_delta(hours)
    }

    /// Jump simulated time to `t`.
    pub fn advance_to(&self, t: NaiveDateTime) {
        let mut state = self.state.lock();
        state.anchor_sim = t;
        state.anchor_real = Instant::now();
    }

    /// Regime last applied to the pool.
    pub fn regime(&self) -> Regime {
        self.state.lock().regime
    }

    /// Switch regime, adjusting surgery capacity by `reduction`.
    ///
    /// Returns the new surgery state, or `None` when already in `target`.
    ///
    /// # Errors
    ///
    /// Capacity or store errors from the pool; the regime is left unchanged.
    pub fn transition(
        &self,
        pool: &ResourcePool,
        target: Regime,
        reduction: u32,
    ) -> Result<Option<ResourceState>, SimulationError> {
        let mut state = self.state.lock();
        if state.regime == target {
            return Ok(None);
        }
        let delta = match target {
            Regime::Working => i64::from(reduction),
            Regime::NonWorking => -i64::from(reduction),
        };
        let surgery = pool.set_capacity(ResourceKind::Surgery, delta)?;
        tracing::info!(?target, surgery = surgery.capacity, "regime changed");
        state.regime = target;
        Ok(Some(surgery))
    }

    /// Apply the regime matching the current simulated time.
    ///
    /// # Errors
    ///
    /// See [`transition`](Self::transition).
    pub fn sync_regime(
        &self,
        pool: &ResourcePool,
        reduction: u32,
    ) -> Result<Option<ResourceState>, SimulationError> {
        let target = Regime::at(self.now());
        self.transition(pool, target, reduction)
    }
}
