//! The engine: pool, queues, snapshots and the step operations driven by the
//! orchestrator.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::HospitalConfig;
use crate::core::processor::sample_service;
use crate::core::{
    AdmissionController, AdmissionOutcome, Arrival, DurationOracle, Mailbox, Notification,
    Placement, Planner, QueueEntry, QueueProcessor, QueueSet, Regime, RescheduleResult,
    ResourcePool, ResourceState, ResourceStore, SimulationClock, SimulationError, Spawn,
    StepCompletion, SystemState, Task,
};
use crate::util::clock::scaled_sleep;
use crate::util::serde::{
    CallbackRef, Diagnosis, PatientId, PatientStatus, QueueName, ResourceKind,
};

/// Surgery or nursing request for a patient past intake or ER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    /// Patient requesting the step.
    pub patient_id: PatientId,
    /// Diagnosis driving routing and duration.
    pub diagnosis: Diagnosis,
    /// Status reported by the previous step.
    pub status: PatientStatus,
    /// Where a queued completion is delivered.
    pub callback: CallbackRef,
}

/// Immediate answer to a step request.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResponse {
    /// Served directly; the completion is returned synchronously.
    Completed(StepCompletion),
    /// Queued; the completion arrives later through the mailbox.
    Queued {
        /// Queue holding the request.
        queue: QueueName,
    },
}

/// Input to the rescheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    /// Patient to reschedule.
    pub patient_id: PatientId,
    /// Diagnosis carried through.
    pub diagnosis: Option<Diagnosis>,
    /// Original arrival, echoed when no slot exists.
    pub arrival_time: NaiveDateTime,
    /// Search start; the current simulated time when absent.
    pub reference: Option<NaiveDateTime>,
    /// Where the result is delivered.
    pub callback: CallbackRef,
}

/// Shared handle to a running simulation core.
#[derive(Clone)]
pub struct Hospital {
    config: Arc<HospitalConfig>,
    pool: Arc<ResourcePool>,
    queues: Arc<QueueSet>,
    state: Arc<SystemState>,
    oracle: Arc<dyn DurationOracle>,
    mailbox: Arc<dyn Mailbox>,
    clock: Arc<SimulationClock>,
    planner: Arc<Planner>,
    admission: AdmissionController,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Hospital {
    /// Assemble an engine over the given collaborators.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Config`] for an invalid configuration, or store
    /// failures while seeding the pool.
    pub fn new(
        config: HospitalConfig,
        store: Arc<dyn ResourceStore>,
        oracle: Arc<dyn DurationOracle>,
        mailbox: Arc<dyn Mailbox>,
    ) -> Result<Self, SimulationError> {
        config.validate().map_err(SimulationError::Config)?;
        let pool = Arc::new(ResourcePool::new(store, &config.capacities)?);
        let queues = Arc::new(QueueSet::new(&pool));
        let clock = Arc::new(SimulationClock::new(config.simulation_start, config.hour_scale()));
        let planner = Arc::new(Planner::new(config.planner, Arc::clone(&oracle)));
        let (shutdown, _) = watch::channel(false);
        tracing::info!(start = %config.simulation_start, "hospital engine ready");
        Ok(Self {
            admission: AdmissionController::new(config.backpressure_threshold),
            config: Arc::new(config),
            pool,
            queues,
            state: Arc::new(SystemState::new()),
            oracle,
            mailbox,
            clock,
            planner,
            shutdown: Arc::new(shutdown),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &HospitalConfig {
        &self.config
    }

    /// Resource pool.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Managed queues.
    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    /// Snapshot registry.
    pub fn state(&self) -> &SystemState {
        &self.state
    }

    /// Duration oracle.
    pub fn oracle(&self) -> &dyn DurationOracle {
        self.oracle.as_ref()
    }

    /// Simulated clock.
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Rescheduler.
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Push a notification; delivery failures are logged, never raised.
    pub async fn notify(&self, callback: &CallbackRef, notification: Notification) {
        if let Err(err) = self.mailbox.deliver(callback, notification).await {
            tracing::warn!(%callback, error = %err, "notification not delivered");
        }
    }

    /// Admission decision for an arrival, delivered to its callback.
    ///
    /// # Errors
    ///
    /// Store failures; nothing is delivered then.
    pub async fn admit(&self, arrival: &Arrival) -> Result<AdmissionOutcome, SimulationError> {
        let outcome = self
            .admission
            .admit(arrival, &self.pool, &self.queues, &self.state)?;
        self.notify(&arrival.callback, Notification::Admission(outcome.clone()))
            .await;
        Ok(outcome)
    }

    /// Intake for an admitted patient; releases the unit reserved at admission.
    ///
    /// # Errors
    ///
    /// [`SimulationError::UnknownPatient`] when the patient was never
    /// admitted, [`SimulationError::InvalidRequest`] when intake already
    /// started, or store failures while releasing the unit.
    pub async fn intake(
        &self,
        patient_id: &str,
        diagnosis: Diagnosis,
    ) -> Result<StepCompletion, SimulationError> {
        match self.state.start_intake(patient_id, diagnosis, self.clock.now()) {
            Some(Ok(())) => {}
            Some(Err(task)) => {
                return Err(SimulationError::InvalidRequest(format!(
                    "{patient_id} is in {task}, not awaiting intake"
                )))
            }
            None => return Err(SimulationError::UnknownPatient(patient_id.to_owned())),
        }
        let hours = self.oracle.intake_duration();
        tokio::time::sleep(scaled_sleep(hours, self.clock.hour_scale())).await;
        self.pool.release(ResourceKind::Intake)?;
        let mut completion = StepCompletion::new(PatientStatus::IntakeFinished, hours);
        completion.require_surgery = Some(self.oracle.requires_surgery(diagnosis));
        tracing::info!(patient = patient_id, duration = completion.duration, "intake finished");
        Ok(completion)
    }

    /// Request an operation.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidRequest`] for a non-surgical diagnosis, or
    /// store failures.
    pub async fn request_surgery(&self, req: StepRequest) -> Result<StepResponse, SimulationError> {
        if !self.oracle.requires_surgery(req.diagnosis) {
            return Err(SimulationError::InvalidRequest(format!(
                "{} needs no surgery",
                req.diagnosis
            )));
        }
        let entry = QueueEntry::surgery(req.patient_id, req.diagnosis, req.status, req.callback);
        self.request_step(QueueName::Surgery, Task::Surgery, entry).await
    }

    /// Request a nursing bed of the diagnosis group's ward.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn request_nursing(&self, req: StepRequest) -> Result<StepResponse, SimulationError> {
        let queue = QueueName::nursing_for(req.diagnosis.group());
        let entry = QueueEntry::nursing(req.patient_id, req.diagnosis, req.status, req.callback);
        self.request_step(queue, Task::Nursing, entry).await
    }

    /// Request ER treatment.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn request_er_treatment(
        &self,
        patient_id: &str,
        callback: CallbackRef,
    ) -> Result<StepResponse, SimulationError> {
        let entry = QueueEntry::er_treatment(patient_id, callback);
        self.request_step(QueueName::Er, Task::ErTreatment, entry).await
    }

    async fn request_step(
        &self,
        queue: QueueName,
        task: Task,
        entry: QueueEntry,
    ) -> Result<StepResponse, SimulationError> {
        let now = self.clock.now();
        let patient_id = entry.patient_id.clone();
        let previous = self.state.get(&patient_id);
        self.state
            .begin(&patient_id, task, entry.diagnosis(), now, true);
        let placement = match self.queues.get(queue).place(&self.pool, entry) {
            Ok(placement) => placement,
            Err(err) => {
                self.state.restore(&patient_id, previous);
                return Err(err);
            }
        };
        match placement {
            Placement::Queued => {
                tracing::info!(%queue, "resource busy: request queued");
                Ok(StepResponse::Queued { queue })
            }
            Placement::Direct(entry) => {
                self.state.mark_running(&entry.patient_id, now);
                self.serve_direct(queue, &entry)
                    .await
                    .map(StepResponse::Completed)
            }
        }
    }

    async fn serve_direct(
        &self,
        queue: QueueName,
        entry: &QueueEntry,
    ) -> Result<StepCompletion, SimulationError> {
        let resource = queue.resource();
        let plan = match sample_service(self.oracle.as_ref(), &entry.request) {
            Ok(plan) => plan,
            Err(err) => {
                self.pool.release(resource)?;
                return Err(err);
            }
        };
        tokio::time::sleep(scaled_sleep(plan.hours, self.clock.hour_scale())).await;
        self.pool.release(resource)?;
        let completion = plan.completion(entry.accumulated_wait);
        tracing::info!(
            %queue,
            patient = %entry.patient_id,
            duration = completion.duration,
            "step finished directly"
        );
        Ok(completion)
    }

    /// Withdraw a queued request.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn cancel(
        &self,
        queue: QueueName,
        callback: &CallbackRef,
    ) -> Result<Option<QueueEntry>, SimulationError> {
        self.queues.get(queue).remove_by_callback_ref(callback)
    }

    /// Patient leaves the hospital.
    ///
    /// # Errors
    ///
    /// [`SimulationError::UnknownPatient`] when no snapshot exists.
    pub fn release_patient(&self, patient_id: &str) -> Result<(), SimulationError> {
        self.state
            .release(patient_id)
            .map(|_| tracing::info!(patient = patient_id, "patient released"))
            .ok_or_else(|| SimulationError::UnknownPatient(patient_id.to_owned()))
    }

    /// Earliest feasible re-admission, or the arrival time flagged infeasible.
    /// The result is delivered to the callback and returned.
    ///
    /// # Errors
    ///
    /// Only errors other than "no feasible slot" are returned.
    pub async fn reschedule(
        &self,
        req: &RescheduleRequest,
    ) -> Result<RescheduleResult, SimulationError> {
        let reference = req.reference.unwrap_or_else(|| self.clock.now());
        let snapshots = self.state.snapshot();
        let result = match self
            .planner
            .plan(&req.patient_id, reference, req.diagnosis, &snapshots)
        {
            Ok(result) => result,
            Err(SimulationError::NoFeasibleSlot) => {
                tracing::warn!(patient = %req.patient_id, "no feasible slot: keeping arrival time");
                RescheduleResult {
                    patient_id: req.patient_id.clone(),
                    reschedule_time: req.arrival_time,
                    diagnosis: req.diagnosis,
                    feasible: false,
                }
            }
            Err(err) => return Err(err),
        };
        self.notify(&req.callback, Notification::Reschedule(result.clone()))
            .await;
        Ok(result)
    }

    /// Switch regime explicitly.
    ///
    /// # Errors
    ///
    /// Capacity or store errors.
    pub fn transition(&self, regime: Regime) -> Result<Option<ResourceState>, SimulationError> {
        self.clock
            .transition(&self.pool, regime, self.config.night_surgery_reduction)
    }

    /// Apply the regime matching the current simulated time.
    ///
    /// # Errors
    ///
    /// Capacity or store errors.
    pub fn sync_regime(&self) -> Result<Option<ResourceState>, SimulationError> {
        self.clock
            .sync_regime(&self.pool, self.config.night_surgery_reduction)
    }

    /// Start one processor per queue.
    pub fn start_processors<S: Spawn>(&self, spawner: &S) {
        for queue in QueueName::ALL {
            let processor = QueueProcessor::new(self.clone(), queue, self.shutdown.subscribe());
            spawner.spawn(processor.run());
        }
        tracing::info!(count = QueueName::ALL.len(), "queue processors started");
    }

    /// Signal every processor to stop after its current step.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("shutdown signalled");
    }

    /// Current state of every pooled resource.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn resource_states(&self) -> Result<Vec<ResourceState>, SimulationError> {
        ResourceKind::ALL
            .iter()
            .map(|kind| self.pool.state(*kind))
            .collect()
    }
}
