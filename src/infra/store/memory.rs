//! In-memory resource store.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::core::{QueueEntry, ResourceStore, SimulationError};
use crate::util::serde::{CallbackRef, QueueName, ResourceKind};

#[derive(Default)]
struct Tables {
    counts: HashMap<ResourceKind, u32>,
    queues: HashMap<QueueName, VecDeque<QueueEntry>>,
}

/// Store keeping counts and queue rows in process memory.
#[derive(Default)]
pub struct InMemoryResourceStore {
    tables: Mutex<Tables>,
}

impl InMemoryResourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceStore for InMemoryResourceStore {
    fn resource_count(&self, kind: ResourceKind) -> Result<u32, SimulationError> {
        self.tables
            .lock()
            .counts
            .get(&kind)
            .copied()
            .ok_or_else(|| SimulationError::Store(format!("resource {kind} not initialised")))
    }

    fn set_resource_count(&self, kind: ResourceKind, count: u32) -> Result<(), SimulationError> {
        self.tables.lock().counts.insert(kind, count);
        Ok(())
    }

    fn enqueue(&self, queue: QueueName, entry: QueueEntry) -> Result<(), SimulationError> {
        self.tables
            .lock()
            .queues
            .entry(queue)
            .or_default()
            .push_back(entry);
        Ok(())
    }

    fn peek_all(&self, queue: QueueName) -> Result<Vec<QueueEntry>, SimulationError> {
        Ok(self
            .tables
            .lock()
            .queues
            .get(&queue)
            .map(|rows| rows.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn replace_all(&self, queue: QueueName, rows: Vec<QueueEntry>) -> Result<(), SimulationError> {
        self.tables.lock().queues.insert(queue, rows.into());
        Ok(())
    }

    fn remove_by_callback_ref(
        &self,
        queue: QueueName,
        callback: &CallbackRef,
    ) -> Result<Option<QueueEntry>, SimulationError> {
        let mut tables = self.tables.lock();
        let Some(rows) = tables.queues.get_mut(&queue) else {
            return Ok(None);
        };
        let mut first = None;
        rows.retain(|row| {
            if &row.callback != callback {
                return true;
            }
            if first.is_none() {
                first = Some(row.clone());
            }
            false
        });
        Ok(first)
    }

    fn update_wait(
        &self,
        queue: QueueName,
        callback: &CallbackRef,
        new_wait: f64,
    ) -> Result<(), SimulationError> {
        let mut tables = self.tables.lock();
        if let Some(rows) = tables.queues.get_mut(&queue) {
            rows.iter_mut()
                .filter(|row| &row.callback == callback)
                .for_each(|row| row.accumulated_wait = new_wait);
        }
        Ok(())
    }
}
