//! Per-resource wait queues with ER-priority reordering.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::core::{ResourcePool, ResourceStore, SimulationError};
use crate::util::serde::{CallbackRef, Diagnosis, PatientId, PatientStatus, QueueName};

/// Resource-specific part of a queued request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueuedRequest {
    /// Waiting for a surgery room.
    Surgery {
        /// Diagnosis driving the operation time.
        diagnosis: Diagnosis,
        /// Status reported by the previous step.
        status: PatientStatus,
    },
    /// Waiting for a nursing bed.
    Nursing {
        /// Diagnosis driving the nursing time.
        diagnosis: Diagnosis,
        /// Status reported by the previous step.
        status: PatientStatus,
    },
    /// Waiting for an ER slot.
    ErTreatment,
}

/// A pending request owned by exactly one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Patient waiting.
    pub patient_id: PatientId,
    /// Where the completion is delivered.
    pub callback: CallbackRef,
    /// Simulated hours spent behind other patients so far.
    pub accumulated_wait: f64,
    /// Resource-specific request.
    pub request: QueuedRequest,
}

impl QueueEntry {
    /// Surgery request.
    pub fn surgery(
        patient_id: impl Into<PatientId>,
        diagnosis: Diagnosis,
        status: PatientStatus,
        callback: CallbackRef,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            callback,
            accumulated_wait: 0.0,
            request: QueuedRequest::Surgery { diagnosis, status },
        }
    }

    /// Nursing request.
    pub fn nursing(
        patient_id: impl Into<PatientId>,
        diagnosis: Diagnosis,
        status: PatientStatus,
        callback: CallbackRef,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            callback,
            accumulated_wait: 0.0,
            request: QueuedRequest::Nursing { diagnosis, status },
        }
    }

    /// ER treatment request.
    pub fn er_treatment(patient_id: impl Into<PatientId>, callback: CallbackRef) -> Self {
        Self {
            patient_id: patient_id.into(),
            callback,
            accumulated_wait: 0.0,
            request: QueuedRequest::ErTreatment,
        }
    }

    /// Status carried from the previous step, if the request has one.
    pub const fn status(&self) -> Option<PatientStatus> {
        match &self.request {
            QueuedRequest::Surgery { status, .. } | QueuedRequest::Nursing { status, .. } => {
                Some(*status)
            }
            QueuedRequest::ErTreatment => None,
        }
    }

    /// Diagnosis of the request, if any.
    pub const fn diagnosis(&self) -> Option<Diagnosis> {
        match &self.request {
            QueuedRequest::Surgery { diagnosis, .. } | QueuedRequest::Nursing { diagnosis, .. } => {
                Some(*diagnosis)
            }
            QueuedRequest::ErTreatment => None,
        }
    }

    /// ER-discharged patients jump ahead of planned ones.
    pub fn has_er_priority(&self) -> bool {
        self.status() == Some(PatientStatus::ErTreatmentFinished)
    }
}

/// Where a step request ended up.
#[derive(Debug)]
pub enum Placement {
    /// Queue was empty and a unit was acquired; the caller serves it directly.
    Direct(QueueEntry),
    /// Appended to the queue; the processor will serve it.
    Queued,
}

/// Stable partition: ER-priority entries first, insertion order kept in both groups.
pub fn prioritize(entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
    let (mut front, back): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(QueueEntry::has_er_priority);
    front.extend(back);
    front
}

/// Ordered waiting list for one queued resource.
///
/// Rows live in the [`ResourceStore`]; the queue mutex serializes compound
/// operations. Lock order is always queue, then pool.
pub struct ResourceQueue {
    name: QueueName,
    store: Arc<dyn ResourceStore>,
    guard: Mutex<()>,
    wake: Arc<Notify>,
}

impl ResourceQueue {
    /// Create a queue over a store; `wake` is signalled on every append.
    pub fn new(name: QueueName, store: Arc<dyn ResourceStore>, wake: Arc<Notify>) -> Self {
        Self {
            name,
            store,
            guard: Mutex::new(()),
            wake,
        }
    }

    /// Queue identity.
    pub const fn name(&self) -> QueueName {
        self.name
    }

    /// Append an entry, reordering when it carries ER priority.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn append(&self, entry: QueueEntry) -> Result<(), SimulationError> {
        {
            let _guard = self.guard.lock();
            self.append_locked(entry)?;
        }
        self.wake.notify_one();
        Ok(())
    }

    fn append_locked(&self, entry: QueueEntry) -> Result<(), SimulationError> {
        let reorder = entry.has_er_priority();
        tracing::debug!(queue = %self.name, patient = %entry.patient_id, reorder, "enqueue");
        if !reorder {
            return self.store.enqueue(self.name, entry);
        }
        let mut rows = self.store.peek_all(self.name)?;
        rows.push(entry);
        self.store.replace_all(self.name, prioritize(rows))
    }

    /// Skip the queue when it is empty and a unit is free, otherwise append.
    ///
    /// The emptiness check, the acquire and the append happen under the
    /// queue lock, so a concurrent processor cannot overtake the request.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn place(&self, pool: &ResourcePool, entry: QueueEntry) -> Result<Placement, SimulationError> {
        let placement = {
            let _guard = self.guard.lock();
            let empty = self.store.peek_all(self.name)?.is_empty();
            if empty && pool.acquire(self.name.resource())? {
                Placement::Direct(entry)
            } else {
                self.append_locked(entry)?;
                Placement::Queued
            }
        };
        if matches!(placement, Placement::Queued) {
            self.wake.notify_one();
        }
        Ok(placement)
    }

    /// Pop the head if the queue is non-empty and a unit can be acquired.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged; an acquired unit is handed back
    /// if the head cannot be removed.
    pub fn pop_if_available(&self, pool: &ResourcePool) -> Result<Option<QueueEntry>, SimulationError> {
        let _guard = self.guard.lock();
        let Some(head) = self.store.peek_all(self.name)?.into_iter().next() else {
            return Ok(None);
        };
        let resource = self.name.resource();
        if !pool.acquire(resource)? {
            return Ok(None);
        }
        match self.store.remove_by_callback_ref(self.name, &head.callback) {
            Ok(Some(entry)) => Ok(Some(entry)),
            Ok(None) => {
                pool.release(resource)?;
                Ok(None)
            }
            Err(err) => {
                pool.release(resource)?;
                Err(err)
            }
        }
    }

    /// Remove and return the head regardless of pool state.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn pop_front(&self) -> Result<Option<QueueEntry>, SimulationError> {
        let _guard = self.guard.lock();
        let Some(head) = self.store.peek_all(self.name)?.into_iter().next() else {
            return Ok(None);
        };
        self.store.remove_by_callback_ref(self.name, &head.callback)
    }

    /// Remove an entry by its callback reference.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn remove_by_callback_ref(
        &self,
        callback: &CallbackRef,
    ) -> Result<Option<QueueEntry>, SimulationError> {
        let _guard = self.guard.lock();
        self.store.remove_by_callback_ref(self.name, callback)
    }

    /// Add `delta` simulated hours to one entry's accumulated wait.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn add_wait(&self, callback: &CallbackRef, delta: f64) -> Result<bool, SimulationError> {
        let _guard = self.guard.lock();
        let current = self
            .store
            .peek_all(self.name)?
            .into_iter()
            .find(|e| &e.callback == callback);
        match current {
            Some(entry) => {
                self.store
                    .update_wait(self.name, callback, entry.accumulated_wait + delta)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add `delta` simulated hours to every entry still queued.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn add_wait_all(&self, delta: f64) -> Result<usize, SimulationError> {
        let _guard = self.guard.lock();
        let entries = self.store.peek_all(self.name)?;
        for entry in &entries {
            self.store
                .update_wait(self.name, &entry.callback, entry.accumulated_wait + delta)?;
        }
        Ok(entries.len())
    }

    /// Ordered copy of the queue.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn entries(&self) -> Result<Vec<QueueEntry>, SimulationError> {
        let _guard = self.guard.lock();
        self.store.peek_all(self.name)
    }

    /// Number of queued entries.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn len(&self) -> Result<usize, SimulationError> {
        self.entries().map(|e| e.len())
    }

    /// Whether nothing is queued.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn is_empty(&self) -> Result<bool, SimulationError> {
        self.len().map(|n| n == 0)
    }

    /// Entries whose carried status equals `status`.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn count_with_status(&self, status: PatientStatus) -> Result<usize, SimulationError> {
        Ok(self
            .entries()?
            .iter()
            .filter(|e| e.status() == Some(status))
            .count())
    }
}

/// The four queues managed by the engine.
pub struct QueueSet {
    queues: [ResourceQueue; QueueName::ALL.len()],
}

impl QueueSet {
    /// One queue per [`QueueName`], each woken through its resource's waker.
    pub fn new(pool: &ResourcePool) -> Self {
        let queues = QueueName::ALL
            .map(|name| ResourceQueue::new(name, pool.store(), pool.waker(name.resource())));
        Self { queues }
    }

    /// Queue by name.
    pub fn get(&self, name: QueueName) -> &ResourceQueue {
        &self.queues[name as usize]
    }

    /// Entries with `status` summed over `names`.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn count_with_status(
        &self,
        names: &[QueueName],
        status: PatientStatus,
    ) -> Result<usize, SimulationError> {
        names
            .iter()
            .map(|name| self.get(*name).count_with_status(status))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::InMemoryResourceStore;

    fn queue() -> ResourceQueue {
        ResourceQueue::new(
            QueueName::Surgery,
            Arc::new(InMemoryResourceStore::new()),
            Arc::new(Notify::new()),
        )
    }

    fn planned(id: &str) -> QueueEntry {
        QueueEntry::surgery(
            id,
            Diagnosis::A2,
            PatientStatus::IntakeFinished,
            CallbackRef::new(format!("cb-{id}")),
        )
    }

    fn from_er(id: &str) -> QueueEntry {
        QueueEntry::surgery(
            id,
            Diagnosis::B3,
            PatientStatus::ErTreatmentFinished,
            CallbackRef::new(format!("cb-{id}")),
        )
    }

    fn order(q: &ResourceQueue) -> Vec<String> {
        q.entries().unwrap().into_iter().map(|e| e.patient_id).collect()
    }

    #[test]
    fn test_fifo_without_er_entries() {
        let q = queue();
        for id in ["a", "b", "c"] {
            q.append(planned(id)).unwrap();
        }
        assert_eq!(q.pop_front().unwrap().unwrap().patient_id, "a");
        assert_eq!(q.pop_front().unwrap().unwrap().patient_id, "b");
        assert_eq!(q.pop_front().unwrap().unwrap().patient_id, "c");
        assert!(q.pop_front().unwrap().is_none());
    }

    #[test]
    fn test_er_entry_jumps_ahead() {
        let q = queue();
        q.append(planned("a")).unwrap();
        q.append(planned("b")).unwrap();
        q.append(from_er("new")).unwrap();
        assert_eq!(order(&q), ["new", "a", "b"]);
    }

    #[test]
    fn test_er_entries_keep_relative_order() {
        let q = queue();
        q.append(planned("a")).unwrap();
        q.append(from_er("e1")).unwrap();
        q.append(planned("b")).unwrap();
        q.append(from_er("e2")).unwrap();
        assert_eq!(order(&q), ["e1", "e2", "a", "b"]);
    }

    #[test]
    fn test_remove_and_wait_accounting() {
        let q = queue();
        q.append(planned("a")).unwrap();
        q.append(planned("b")).unwrap();
        q.append(planned("c")).unwrap();

        let removed = q.remove_by_callback_ref(&CallbackRef::new("cb-a")).unwrap();
        assert_eq!(removed.unwrap().patient_id, "a");
        assert_eq!(order(&q), ["b", "c"]);

        assert_eq!(q.add_wait_all(1.25).unwrap(), 2);
        assert!(q.add_wait(&CallbackRef::new("cb-c"), 0.5).unwrap());
        assert!(!q.add_wait(&CallbackRef::new("cb-a"), 0.5).unwrap());

        let waits: Vec<f64> = q.entries().unwrap().iter().map(|e| e.accumulated_wait).collect();
        assert!((waits[0] - 1.25).abs() < 1e-9);
        assert!((waits[1] - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_count_with_status() {
        let q = queue();
        q.append(planned("a")).unwrap();
        q.append(from_er("b")).unwrap();
        assert_eq!(q.count_with_status(PatientStatus::IntakeFinished).unwrap(), 1);
        assert_eq!(q.count_with_status(PatientStatus::ErTreatmentFinished).unwrap(), 1);
    }

    #[test]
    fn test_prioritize_is_stable() {
        let rows = vec![planned("a"), from_er("x"), planned("b"), from_er("y")];
        let ids: Vec<_> = prioritize(rows).into_iter().map(|e| e.patient_id).collect();
        assert_eq!(ids, ["x", "y", "a", "b"]);
    }
}
