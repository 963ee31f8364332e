//! Replays an arrival feed against the engine in scaled real time, optionally
//! walking every admitted patient through their treatment pathway.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::builders::HospitalBuilder;
use crate::config::HospitalConfig;
use crate::core::{
    AppResult, Arrival, DurationOracle, Hospital, Notification, Regime, RescheduleRequest,
    SimulationError, StepCompletion, StepRequest, StepResponse, StochasticOracle,
};
use crate::infra::{ArrivalGenerator, InMemoryMailbox};
use crate::runtime::TokioSpawner;
use crate::util::clock::{next_non_working_hour, next_working_hour, scaled_sleep};
use crate::util::serde::{CallbackRef, Diagnosis, PatientStatus, PatientType};

/// Simulated hours a pathway waits for one queued step before giving up.
const DEFAULT_STEP_TIMEOUT_HOURS: f64 = 7.0 * 24.0;

/// How one admitted patient's pathway ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathwayOutcome {
    /// Released; `complication` when nursing did not end cleanly.
    Discharged {
        /// Nursing reported a complication.
        complication: bool,
    },
    /// A queued step did not complete in time.
    Stalled,
    /// A step failed.
    Failed(String),
}

/// Counts collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReport {
    /// Arrivals replayed.
    pub arrivals: usize,
    /// Patients admitted.
    pub admitted: usize,
    /// Patients sent home.
    pub sent_home: usize,
    /// Sent-home patients offered a slot.
    pub rescheduled: usize,
    /// Sent-home patients for whom no slot existed.
    pub infeasible: usize,
    /// Pathways ending in release.
    pub discharged: usize,
    /// Releases after a nursing complication.
    pub complications: usize,
    /// Pathways that timed out waiting on a queue.
    pub stalled: usize,
    /// Pathways that hit an error.
    pub failed: usize,
}

impl DriverReport {
    fn record(&mut self, outcome: &PathwayOutcome) {
        match outcome {
            PathwayOutcome::Discharged { complication } => {
                self.discharged += 1;
                self.complications += usize::from(*complication);
            }
            PathwayOutcome::Stalled => self.stalled += 1,
            PathwayOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Replays arrivals and plays the orchestrator's part for each patient.
pub struct SimulationDriver {
    hospital: Hospital,
    mailbox: Arc<InMemoryMailbox>,
    generator: ArrivalGenerator,
    follow_pathways: bool,
    step_timeout: Duration,
}

impl SimulationDriver {
    /// Driver over a fresh in-memory engine.
    ///
    /// # Errors
    ///
    /// Invalid configuration or store failures.
    pub fn new(config: HospitalConfig) -> Result<Self, SimulationError> {
        let mailbox = Arc::new(InMemoryMailbox::new());
        let oracle: Arc<dyn DurationOracle> = Arc::new(StochasticOracle::new(config.seed));
        let generator = ArrivalGenerator::new(
            config.seed.map(|s| s.wrapping_add(1)),
            Arc::clone(&oracle),
        );
        let step_timeout = scaled_sleep(DEFAULT_STEP_TIMEOUT_HOURS, config.hour_scale());
        let hospital = HospitalBuilder::new(config)
            .with_oracle(oracle)
            .with_mailbox(mailbox.clone())
            .build()?;
        Ok(Self {
            hospital,
            mailbox,
            generator,
            follow_pathways: true,
            step_timeout,
        })
    }

    /// Walk admitted patients through their steps (default) or only replay
    /// admissions.
    #[must_use]
    pub const fn with_pathways(mut self, follow: bool) -> Self {
        self.follow_pathways = follow;
        self
    }

    /// How long, in real time, a pathway waits on one queued step before it
    /// withdraws the request.
    #[must_use]
    pub const fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Engine driven by this driver.
    pub const fn hospital(&self) -> &Hospital {
        &self.hospital
    }

    /// Mailbox receiving every outcome.
    pub fn mailbox(&self) -> &InMemoryMailbox {
        &self.mailbox
    }

    /// Generate arrivals in `[start, end)` and replay them.
    ///
    /// # Errors
    ///
    /// Store failures surfaced by the engine.
    pub async fn run(&mut self, start: NaiveDateTime, end: NaiveDateTime) -> AppResult<DriverReport> {
        let arrivals = self.generator.generate(start, end);
        self.hospital.clock().advance_to(start);
        self.replay(arrivals).await
    }

    /// Replay a time-ordered feed from the current simulated time.
    ///
    /// # Errors
    ///
    /// Store failures surfaced by the engine.
    pub async fn replay(&self, arrivals: Vec<Arrival>) -> AppResult<DriverReport> {
        let hospital = &self.hospital;
        hospital.start_processors(&TokioSpawner::current());
        hospital.sync_regime().context("initial regime")?;
        let regime_task = tokio::spawn(follow_regime(hospital.clone()));

        let mut report = DriverReport::default();
        let mut pathways = JoinSet::new();
        for arrival in arrivals {
            sleep_until(hospital, arrival.arrival_time).await;
            hospital.sync_regime().context("regime sync")?;

            report.arrivals += 1;
            let outcome = hospital
                .admit(&arrival)
                .await
                .with_context(|| format!("admitting {}", arrival.callback))?;

            if !outcome.is_admitted() {
                report.sent_home += 1;
                if arrival.supplied_id().is_some() {
                    let offer = hospital
                        .reschedule(&RescheduleRequest {
                            patient_id: outcome.patient_id.clone(),
                            diagnosis: arrival.diagnosis,
                            arrival_time: arrival.arrival_time,
                            reference: None,
                            callback: arrival.callback.clone(),
                        })
                        .await?;
                    if offer.feasible {
                        report.rescheduled += 1;
                    } else {
                        report.infeasible += 1;
                    }
                }
                continue;
            }
            report.admitted += 1;

            if self.follow_pathways {
                let walker = PathwayWalker {
                    hospital: hospital.clone(),
                    mailbox: Arc::clone(&self.mailbox),
                    timeout: self.step_timeout,
                };
                let patient_id = outcome.patient_id;
                let kind = arrival.patient_type;
                let diagnosis = arrival.diagnosis;
                pathways.spawn(async move { walker.walk(&patient_id, kind, diagnosis).await });
            }
        }

        while let Some(joined) = pathways.join_next().await {
            let outcome = joined.unwrap_or_else(|err| PathwayOutcome::Failed(err.to_string()));
            report.record(&outcome);
        }
        regime_task.abort();
        hospital.shutdown();
        tracing::info!(?report, "run finished");
        Ok(report)
    }
}

/// Suspend until the simulated clock reaches `t`.
async fn sleep_until(hospital: &Hospital, t: NaiveDateTime) {
    let lead = t - hospital.clock().now();
    if lead > chrono::TimeDelta::zero() {
        #[allow(clippy::cast_precision_loss)]
        let hours = lead.num_milliseconds() as f64 / 3_600_000.0;
        tokio::time::sleep(scaled_sleep(hours, hospital.clock().hour_scale())).await;
    }
}

/// Switch regime at every working-hour boundary until aborted.
async fn follow_regime(hospital: Hospital) {
    loop {
        let now = hospital.clock().now();
        let boundary = match Regime::at(now) {
            Regime::Working => next_non_working_hour(now),
            Regime::NonWorking => next_working_hour(now),
        };
        sleep_until(&hospital, boundary).await;
        if let Err(err) = hospital.sync_regime() {
            tracing::warn!(error = %err, "regime switch failed");
        }
    }
}

struct PathwayWalker {
    hospital: Hospital,
    mailbox: Arc<InMemoryMailbox>,
    timeout: Duration,
}

impl PathwayWalker {
    async fn walk(
        &self,
        patient_id: &str,
        kind: PatientType,
        diagnosis: Option<Diagnosis>,
    ) -> PathwayOutcome {
        let result = match kind {
            PatientType::Er => self.er_pathway(patient_id).await,
            PatientType::Planned => match diagnosis {
                Some(diagnosis) => self.planned_pathway(patient_id, diagnosis).await,
                None => Err(SimulationError::InvalidRequest("planned patient without diagnosis".into())),
            },
        };
        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(patient = patient_id, error = %err, "pathway failed");
                if let Err(err) = self.hospital.release_patient(patient_id) {
                    tracing::warn!(patient = patient_id, error = %err, "release after failure failed");
                }
                PathwayOutcome::Failed(err.to_string())
            }
        }
    }

    async fn planned_pathway(
        &self,
        patient_id: &str,
        diagnosis: Diagnosis,
    ) -> Result<PathwayOutcome, SimulationError> {
        let intake = self.hospital.intake(patient_id, diagnosis).await?;
        let surgery = intake.require_surgery.unwrap_or(false);
        self.treat(patient_id, diagnosis, PatientStatus::IntakeFinished, surgery)
            .await
    }

    async fn er_pathway(&self, patient_id: &str) -> Result<PathwayOutcome, SimulationError> {
        let callback = step_callback(patient_id, "er");
        let response = self
            .hospital
            .request_er_treatment(patient_id, callback.clone())
            .await?;
        let Some(done) = self.settle(patient_id, response, &callback).await? else {
            return Ok(PathwayOutcome::Stalled);
        };
        match (done.phantom_pain, done.diagnosis) {
            (Some(false), Some(diagnosis)) => {
                let surgery = done.require_surgery.unwrap_or(false);
                self.treat(patient_id, diagnosis, PatientStatus::ErTreatmentFinished, surgery)
                    .await
            }
            _ => {
                self.hospital.release_patient(patient_id)?;
                Ok(PathwayOutcome::Discharged { complication: false })
            }
        }
    }

    async fn treat(
        &self,
        patient_id: &str,
        diagnosis: Diagnosis,
        mut status: PatientStatus,
        surgery: bool,
    ) -> Result<PathwayOutcome, SimulationError> {
        if surgery {
            let callback = step_callback(patient_id, "surgery");
            let response = self
                .hospital
                .request_surgery(self.request(patient_id, diagnosis, status, &callback))
                .await?;
            if self.settle(patient_id, response, &callback).await?.is_none() {
                return Ok(PathwayOutcome::Stalled);
            }
            status = PatientStatus::SurgeryFinished;
        }

        let callback = step_callback(patient_id, "nursing");
        let response = self
            .hospital
            .request_nursing(self.request(patient_id, diagnosis, status, &callback))
            .await?;
        let Some(done) = self.settle(patient_id, response, &callback).await? else {
            return Ok(PathwayOutcome::Stalled);
        };
        self.hospital.release_patient(patient_id)?;
        Ok(PathwayOutcome::Discharged {
            complication: done.release == Some(false),
        })
    }

    fn request(
        &self,
        patient_id: &str,
        diagnosis: Diagnosis,
        status: PatientStatus,
        callback: &CallbackRef,
    ) -> StepRequest {
        StepRequest {
            patient_id: patient_id.to_owned(),
            diagnosis,
            status,
            callback: callback.clone(),
        }
    }

    /// Completion of a step, waiting on the mailbox when it was queued.
    ///
    /// A queued step that does not finish in time is withdrawn and the
    /// patient released; the callback's mailbox key is dropped either way.
    async fn settle(
        &self,
        patient_id: &str,
        response: StepResponse,
        callback: &CallbackRef,
    ) -> Result<Option<StepCompletion>, SimulationError> {
        let queue = match response {
            StepResponse::Completed(done) => return Ok(Some(done)),
            StepResponse::Queued { queue } => queue,
        };
        let mut notification = self.mailbox.wait_for(callback, self.timeout).await;
        if notification.is_none() {
            match self.hospital.cancel(queue, callback) {
                Ok(Some(_)) => tracing::warn!(%queue, %callback, "step timed out: request withdrawn"),
                // Already picked up by the processor.
                Ok(None) => notification = self.mailbox.wait_for(callback, self.timeout).await,
                Err(err) => tracing::warn!(%queue, %callback, error = %err, "withdrawing request failed"),
            }
        }
        self.mailbox.take(callback);
        match notification {
            Some(Notification::StepFinished(done)) => Ok(Some(done)),
            Some(Notification::StepFailed(failure)) => Err(SimulationError::InvalidRequest(format!(
                "{}: {}",
                failure.status, failure.reason
            ))),
            Some(other) => Err(SimulationError::Delivery(format!(
                "unexpected notification on {callback}: {other:?}"
            ))),
            None => {
                if let Err(err) = self.hospital.release_patient(patient_id) {
                    tracing::warn!(patient = patient_id, error = %err, "release after stall failed");
                }
                Ok(None)
            }
        }
    }
}

fn step_callback(patient_id: &str, step: &str) -> CallbackRef {
    CallbackRef::new(format!("{patient_id}/{step}"))
}
