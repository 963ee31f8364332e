//! Runs the hospital simulation for a number of days and prints a JSON report.
//!
//! Usage: `hospital-sim [DAYS]` (default 7). Settings come from
//! `HOSPITAL_SIM_*` environment variables or a `.env` file.

use anyhow::Context;
use chrono::TimeDelta;

use hospital_capacity_sim::config::HospitalConfig;
use hospital_capacity_sim::core::AppResult;
use hospital_capacity_sim::runtime::{overview, SimulationDriver};
use hospital_capacity_sim::util::telemetry::init_tracing;

const DEFAULT_DAYS: i64 = 7;

fn main() -> AppResult<()> {
    init_tracing();

    let days = match std::env::args().nth(1) {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("invalid day count {raw:?}"))?,
        None => DEFAULT_DAYS,
    };
    let config = HospitalConfig::from_env().map_err(anyhow::Error::msg)?;
    let start = config.simulation_start;
    let end = start + TimeDelta::days(days.max(1));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().max(2))
        .thread_name("hospital-sim")
        .enable_all()
        .build()
        .context("building runtime")?;

    runtime.block_on(async move {
        let mut driver = SimulationDriver::new(config)?;
        tracing::info!(%start, %end, "simulation starting");
        let report = driver.run(start, end).await?;
        let state = overview(driver.hospital())?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        tracing::info!(
            patients = state.patients,
            time = %state.time,
            "simulation finished"
        );
        Ok::<(), anyhow::Error>(())
    })
}
