//! Queue processors and the service sampling shared with the direct path.

use std::future::Future;

use tokio::sync::watch;

use crate::core::{
    DurationOracle, Hospital, Notification, QueueEntry, QueuedRequest, SimulationError,
    StepCompletion, StepFailure,
};
use crate::util::clock::scaled_sleep;
use crate::util::serde::{PatientStatus, QueueName};

/// Abstraction for spawning async tasks (runtime adapter).
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Sampled service time and the completion it will produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePlan {
    /// Simulated hours the resource is occupied.
    pub hours: f64,
    completion: StepCompletion,
}

impl ServicePlan {
    /// Completion reported after waiting `accumulated_wait` hours in the queue.
    pub fn completion(&self, accumulated_wait: f64) -> StepCompletion {
        let mut completion = self.completion.clone();
        completion.duration = crate::util::clock::round2(accumulated_wait + self.hours);
        completion
    }
}

/// Draw the service time and outcome fields for a request.
///
/// # Errors
///
/// [`SimulationError::UnknownDiagnosis`] when the oracle has no table entry.
pub fn sample_service(
    oracle: &dyn DurationOracle,
    request: &QueuedRequest,
) -> Result<ServicePlan, SimulationError> {
    let plan = match request {
        QueuedRequest::Surgery { diagnosis, .. } => {
            let hours = oracle.operation_duration(*diagnosis)?;
            ServicePlan {
                hours,
                completion: StepCompletion::new(PatientStatus::SurgeryFinished, hours),
            }
        }
        QueuedRequest::Nursing { diagnosis, .. } => {
            let hours = oracle.nursing_duration(*diagnosis)?;
            let mut completion = StepCompletion::new(PatientStatus::NursingFinished, hours);
            completion.release = Some(!oracle.has_complication(*diagnosis));
            ServicePlan { hours, completion }
        }
        QueuedRequest::ErTreatment => {
            let hours = oracle.er_treatment_duration();
            let mut completion = StepCompletion::new(PatientStatus::ErTreatmentFinished, hours);
            let phantom = oracle.phantom_pain();
            completion.phantom_pain = Some(phantom);
            if !phantom {
                let diagnosis = oracle.assign_diagnosis(None);
                completion.diagnosis = Some(diagnosis);
                completion.require_surgery = Some(oracle.requires_surgery(diagnosis));
            }
            ServicePlan { hours, completion }
        }
    };
    Ok(plan)
}

/// Status reported when a popped request cannot be served.
pub const fn failure_status(queue: QueueName) -> &'static str {
    match queue {
        QueueName::Surgery => "Surgery failed",
        QueueName::NursingA | QueueName::NursingB => "Nursing failed",
        QueueName::Er => "ER Treatment failed",
    }
}

/// Drains one queue for the lifetime of the engine.
pub struct QueueProcessor {
    hospital: Hospital,
    queue: QueueName,
    shutdown: watch::Receiver<bool>,
}

impl QueueProcessor {
    /// Processor for `queue`, stopping when `shutdown` turns true.
    pub const fn new(hospital: Hospital, queue: QueueName, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            hospital,
            queue,
            shutdown,
        }
    }

    /// Serve until shutdown. Sleeps on the resource's wake signal when idle,
    /// with the idle interval as fallback.
    pub async fn run(mut self) {
        let waker = self.hospital.pool().waker(self.queue.resource());
        let idle = self.hospital.config().idle_interval();
        tracing::debug!(queue = %self.queue, "processor started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self.serve_next().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => tracing::warn!(queue = %self.queue, error = %err, "processor step failed"),
            }
            tokio::select! {
                () = waker.notified() => {}
                () = tokio::time::sleep(idle) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(queue = %self.queue, "processor stopped");
    }

    /// Serve the head of the queue if a unit is free.
    ///
    /// Returns whether an entry was taken.
    ///
    /// # Errors
    ///
    /// Store failures while popping or releasing.
    pub async fn serve_next(&self) -> Result<bool, SimulationError> {
        let hospital = &self.hospital;
        let queue = hospital.queues().get(self.queue);
        let Some(entry) = queue.pop_if_available(hospital.pool())? else {
            return Ok(false);
        };
        hospital
            .state()
            .mark_running(&entry.patient_id, hospital.clock().now());
        tracing::debug!(
            queue = %self.queue,
            patient = %entry.patient_id,
            waited = entry.accumulated_wait,
            "picked up"
        );

        let notification = match sample_service(hospital.oracle(), &entry.request) {
            Ok(plan) => match self.occupy(&entry, &plan).await {
                Ok(done) => Notification::StepFinished(done),
                Err(err) => {
                    self.report_failure(&entry, &err).await;
                    return Err(err);
                }
            },
            Err(err) => {
                tracing::warn!(queue = %self.queue, patient = %entry.patient_id, error = %err, "sampling failed");
                let released = hospital.pool().release(self.queue.resource());
                self.report_failure(&entry, &err).await;
                released?;
                return Ok(true);
            }
        };
        hospital.notify(&entry.callback, notification).await;
        Ok(true)
    }

    async fn report_failure(&self, entry: &QueueEntry, err: &SimulationError) {
        let failure = StepFailure {
            status: failure_status(self.queue).to_owned(),
            reason: err.to_string(),
        };
        self.hospital
            .notify(&entry.callback, Notification::StepFailed(failure))
            .await;
    }

    async fn occupy(&self, entry: &QueueEntry, plan: &ServicePlan) -> Result<StepCompletion, SimulationError> {
        let hospital = &self.hospital;
        tokio::time::sleep(scaled_sleep(plan.hours, hospital.clock().hour_scale())).await;
        if let Err(err) = hospital.queues().get(self.queue).add_wait_all(plan.hours) {
            tracing::warn!(queue = %self.queue, error = %err, "wait accounting failed");
        }
        hospital.pool().release(self.queue.resource())?;
        let completion = plan.completion(entry.accumulated_wait);
        tracing::info!(
            queue = %self.queue,
            patient = %entry.patient_id,
            duration = completion.duration,
            "step finished from queue"
        );
        Ok(completion)
    }
}
