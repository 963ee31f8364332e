//! Hospital, resource and planner configuration structures.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::util::serde::ResourceKind;

/// Prefix of every environment variable read by [`HospitalConfig::from_env`].
pub const ENV_PREFIX: &str = "HOSPITAL_SIM_";

/// Units per pooled resource in the working regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceCapacities {
    /// Intake staff.
    pub intake: u32,
    /// Surgery rooms.
    pub surgery: u32,
    /// Nursing beds for group A.
    pub bed_a: u32,
    /// Nursing beds for group B.
    pub bed_b: u32,
    /// Emergency-room slots.
    pub er: u32,
}

impl Default for ResourceCapacities {
    fn default() -> Self {
        Self {
            intake: 4,
            surgery: 5,
            bed_a: 30,
            bed_b: 40,
            er: 9,
        }
    }
}

impl ResourceCapacities {
    /// Units configured for a resource.
    pub const fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Intake => self.intake,
            ResourceKind::Surgery => self.surgery,
            ResourceKind::BedA => self.bed_a,
            ResourceKind::BedB => self.bed_b,
            ResourceKind::Er => self.er,
        }
    }

    fn set(&mut self, kind: ResourceKind, value: u32) {
        match kind {
            ResourceKind::Intake => self.intake = value,
            ResourceKind::Surgery => self.surgery = value,
            ResourceKind::BedA => self.bed_a = value,
            ResourceKind::BedB => self.bed_b = value,
            ResourceKind::Er => self.er = value,
        }
    }
}

/// Rescheduler limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Days searched ahead of the reference time.
    pub horizon_days: u32,
    /// First candidate hour of a working day.
    pub window_start_hour: u32,
    /// Last candidate hour of a working day (inclusive).
    pub window_end_hour: u32,
    /// Upper bound on summed pending surgery and nursing demand.
    pub aggregate_limit: u32,
    /// Concurrent intakes tolerated at a candidate hour (exclusive bound).
    pub intake_capacity: u32,
    /// Running surgeries below which one waiting surgery is discounted.
    pub surgery_capacity: u32,
    /// Running group A nursing stays tolerated.
    pub nursing_a_capacity: u32,
    /// Running group B nursing stays tolerated.
    pub nursing_b_capacity: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            window_start_hour: 8,
            window_end_hour: 17,
            aggregate_limit: 2,
            intake_capacity: 4,
            surgery_capacity: 5,
            nursing_a_capacity: 30,
            nursing_b_capacity: 40,
        }
    }
}

impl PlannerConfig {
    /// Validate planner values.
    pub fn validate(&self) -> Result<(), String> {
        if self.horizon_days == 0 {
            return Err("horizon_days must be greater than 0".into());
        }
        if self.window_end_hour > 23 {
            return Err("window_end_hour must be an hour of the day".into());
        }
        if self.window_start_hour > self.window_end_hour {
            return Err("window_start_hour must not exceed window_end_hour".into());
        }
        Ok(())
    }
}

/// Root simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HospitalConfig {
    /// Working-regime capacities.
    pub capacities: ResourceCapacities,
    /// Surgery rooms closed outside working hours.
    pub night_surgery_reduction: u32,
    /// `Intake finished` entries queued across surgery and nursing before
    /// planned arrivals are turned away.
    pub backpressure_threshold: usize,
    /// Fallback poll interval of an idle processor, in milliseconds.
    pub idle_interval_ms: u64,
    /// Real milliseconds per simulated hour.
    pub hour_scale_ms: u64,
    /// Seed for the duration oracle and arrival generator.
    pub seed: Option<u64>,
    /// Simulated time at engine start.
    pub simulation_start: NaiveDateTime,
    /// Rescheduler limits.
    pub planner: PlannerConfig,
}

impl Default for HospitalConfig {
    fn default() -> Self {
        Self {
            capacities: ResourceCapacities::default(),
            night_surgery_reduction: 4,
            backpressure_threshold: 2,
            idle_interval_ms: 10,
            hour_scale_ms: 1_000,
            seed: None,
            simulation_start: NaiveDate::from_ymd_opt(2018, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            planner: PlannerConfig::default(),
        }
    }
}

impl HospitalConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        for kind in ResourceKind::ALL {
            if self.capacities.get(kind) == 0 {
                return Err(format!("capacity of {kind} must be greater than 0"));
            }
        }
        if self.night_surgery_reduction >= self.capacities.surgery {
            return Err("night_surgery_reduction must leave at least one surgery room".into());
        }
        if self.idle_interval_ms == 0 {
            return Err("idle_interval_ms must be greater than 0".into());
        }
        if self.hour_scale_ms == 0 {
            return Err("hour_scale_ms must be greater than 0".into());
        }
        self.planner
            .validate()
            .map_err(|e| format!("planner invalid: {e}"))
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `HOSPITAL_SIM_*` variables, after loading `.env`.
    ///
    /// Recognised keys: `CAPACITY_<RESOURCE>` (`INTAKE`, `SURGERY`, `BED_A`,
    /// `BED_B`, `ER`), `NIGHT_SURGERY_REDUCTION`, `BACKPRESSURE_THRESHOLD`,
    /// `IDLE_INTERVAL_MS`, `HOUR_SCALE_MS`, `SEED` and `START`
    /// (`YYYY-MM-DDTHH:MM:SS`).
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut cfg = Self::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        for kind in ResourceKind::ALL {
            let key = format!("CAPACITY_{}", kind.as_str().to_ascii_uppercase());
            if let Some(raw) = var(&key) {
                cfg.capacities.set(kind, parse(&key, &raw)?);
            }
        }
        if let Some(raw) = var("NIGHT_SURGERY_REDUCTION") {
            cfg.night_surgery_reduction = parse("NIGHT_SURGERY_REDUCTION", &raw)?;
        }
        if let Some(raw) = var("BACKPRESSURE_THRESHOLD") {
            cfg.backpressure_threshold = parse("BACKPRESSURE_THRESHOLD", &raw)?;
        }
        if let Some(raw) = var("IDLE_INTERVAL_MS") {
            cfg.idle_interval_ms = parse("IDLE_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = var("HOUR_SCALE_MS") {
            cfg.hour_scale_ms = parse("HOUR_SCALE_MS", &raw)?;
        }
        if let Some(raw) = var("SEED") {
            cfg.seed = Some(parse("SEED", &raw)?);
        }
        if let Some(raw) = var("START") {
            cfg.simulation_start = parse("START", &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Real duration of one simulated hour.
    pub const fn hour_scale(&self) -> Duration {
        Duration::from_millis(self.hour_scale_ms)
    }

    /// Fallback idle poll interval.
    pub const fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{key}: {e}"))
}
