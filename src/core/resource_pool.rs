//! Bounded resource pools backed by an abstract resource store.
//!
//! The store is the authority for `available` counts and queue rows. The pool
//! keeps each resource's capacity behind its own `parking_lot::Mutex`; every
//! read-modify-write of the store's count for that resource happens while the
//! mutex is held, so "check availability" and "acquire" can never interleave
//! with a concurrent acquire/release on the same resource.
//!
//! A capacity reduction larger than the free units leaves a `debt`: units still
//! in use beyond the new capacity. Releases and later increases pay the debt
//! off before anything becomes available again, so
//! `in_use = capacity - available + debt` holds across regime changes.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::ResourceCapacities;
use crate::core::{QueueEntry, SimulationError};
use crate::util::serde::{CallbackRef, QueueName, ResourceKind};

/// Abstraction for the persistent resource store.
///
/// Implementations must make each call atomic on its own; compound
/// operations are serialized by [`ResourcePool`] and
/// [`ResourceQueue`](crate::core::ResourceQueue).
pub trait ResourceStore: Send + Sync {
    /// Current available units of a resource.
    fn resource_count(&self, kind: ResourceKind) -> Result<u32, SimulationError>;
    /// Overwrite the available units of a resource.
    fn set_resource_count(&self, kind: ResourceKind, count: u32) -> Result<(), SimulationError>;
    /// Append a row at the back of a queue.
    fn enqueue(&self, queue: QueueName, entry: QueueEntry) -> Result<(), SimulationError>;
    /// Ordered rows of a queue, left in place.
    fn peek_all(&self, queue: QueueName) -> Result<Vec<QueueEntry>, SimulationError>;
    /// Replace every row of a queue with `rows`, in order, as one atomic
    /// mutation. On error the previous rows are left untouched.
    fn replace_all(&self, queue: QueueName, rows: Vec<QueueEntry>) -> Result<(), SimulationError>;
    /// Remove the rows registered under a callback reference and return the
    /// first of them.
    fn remove_by_callback_ref(
        &self,
        queue: QueueName,
        callback: &CallbackRef,
    ) -> Result<Option<QueueEntry>, SimulationError>;
    /// Overwrite the accumulated wait of a queued row.
    fn update_wait(
        &self,
        queue: QueueName,
        callback: &CallbackRef,
        new_wait: f64,
    ) -> Result<(), SimulationError>;
}

/// Point-in-time view of one pooled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource name.
    pub name: ResourceKind,
    /// Configured units for the current regime.
    pub capacity: u32,
    /// Units not currently occupied.
    pub available: u32,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    capacity: u32,
    debt: u32,
}

struct Slot {
    limits: Mutex<Limits>,
    wake: Arc<Notify>,
}

/// Named bounded counters with atomic acquire/release.
pub struct ResourcePool {
    store: Arc<dyn ResourceStore>,
    slots: [Slot; ResourceKind::ALL.len()],
}

impl ResourcePool {
    /// Create a pool and seed the store with every resource fully available.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Store`] if the initial counts cannot be written.
    pub fn new(
        store: Arc<dyn ResourceStore>,
        capacities: &ResourceCapacities,
    ) -> Result<Self, SimulationError> {
        for kind in ResourceKind::ALL {
            store.set_resource_count(kind, capacities.get(kind))?;
        }
        let slots = ResourceKind::ALL.map(|kind| Slot {
            limits: Mutex::new(Limits {
                capacity: capacities.get(kind),
                debt: 0,
            }),
            wake: Arc::new(Notify::new()),
        });
        tracing::debug!(?capacities, "resource pool initialised");
        Ok(Self { store, slots })
    }

    fn slot(&self, kind: ResourceKind) -> &Slot {
        &self.slots[kind as usize]
    }

    /// Take one unit if any is available.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged; nothing is taken in that case.
    pub fn acquire(&self, kind: ResourceKind) -> Result<bool, SimulationError> {
        self.acquire_when(kind, || Ok(true))
    }

    /// Take one unit only if `admit` agrees, with the check made while the
    /// resource's lock is held.
    ///
    /// `admit` must not touch this resource's slot.
    ///
    /// # Errors
    ///
    /// Errors from `admit` or the store; nothing is taken in that case.
    pub fn acquire_when<F>(&self, kind: ResourceKind, admit: F) -> Result<bool, SimulationError>
    where
        F: FnOnce() -> Result<bool, SimulationError>,
    {
        let _limits = self.slot(kind).limits.lock();
        if !admit()? {
            return Ok(false);
        }
        let available = self.store.resource_count(kind)?;
        if available == 0 {
            tracing::trace!(resource = %kind, "acquire refused: saturated");
            return Ok(false);
        }
        self.store.set_resource_count(kind, available - 1)?;
        tracing::trace!(resource = %kind, available = available - 1, "acquired");
        Ok(true)
    }

    /// Return one unit and wake the resource's processor.
    ///
    /// The unit pays off outstanding debt first; otherwise `available` grows,
    /// capped at capacity.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn release(&self, kind: ResourceKind) -> Result<(), SimulationError> {
        let slot = self.slot(kind);
        {
            let mut limits = slot.limits.lock();
            if limits.debt > 0 {
                limits.debt -= 1;
                tracing::trace!(resource = %kind, debt = limits.debt, "released into debt");
                return Ok(());
            }
            let available = self.store.resource_count(kind)?;
            let next = (available + 1).min(limits.capacity);
            self.store.set_resource_count(kind, next)?;
            tracing::trace!(resource = %kind, available = next, "released");
        }
        slot.wake.notify_one();
        Ok(())
    }

    /// Adjust capacity and availability together by `delta`.
    ///
    /// A reduction never takes `available` below zero; the shortfall is kept
    /// as debt and paid off by releases. An increase pays off debt before
    /// adding available units.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidCapacity`] when the capacity itself would go
    /// negative or overflow; store failures leave the capacity unchanged.
    pub fn set_capacity(
        &self,
        kind: ResourceKind,
        delta: i64,
    ) -> Result<ResourceState, SimulationError> {
        let slot = self.slot(kind);
        let state = {
            let mut limits = slot.limits.lock();
            let next_capacity = u32::try_from(i64::from(limits.capacity) + delta).map_err(|_| {
                SimulationError::InvalidCapacity {
                    resource: kind,
                    reason: format!("capacity {} cannot change by {delta}", limits.capacity),
                }
            })?;
            let available = self.store.resource_count(kind)?;
            // Net free units once outstanding debt is counted against them.
            let net = i64::from(available) - i64::from(limits.debt) + delta;
            let (next_available, next_debt) = if net >= 0 {
                (u32::try_from(net).unwrap_or(u32::MAX).min(next_capacity), 0)
            } else {
                (0, u32::try_from(-net).unwrap_or(u32::MAX))
            };
            // Store first: a failed write must not leave changed limits behind.
            self.store.set_resource_count(kind, next_available)?;
            *limits = Limits {
                capacity: next_capacity,
                debt: next_debt,
            };
            ResourceState {
                name: kind,
                capacity: next_capacity,
                available: next_available,
            }
        };
        tracing::info!(
            resource = %kind,
            capacity = state.capacity,
            available = state.available,
            "capacity changed"
        );
        if delta > 0 {
            slot.wake.notify_one();
        }
        Ok(state)
    }

    /// Consistent `{capacity, available}` view of a resource.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn state(&self, kind: ResourceKind) -> Result<ResourceState, SimulationError> {
        let limits = self.slot(kind).limits.lock();
        Ok(ResourceState {
            name: kind,
            capacity: limits.capacity,
            available: self.store.resource_count(kind)?,
        })
    }

    /// Available units of a resource.
    ///
    /// # Errors
    ///
    /// Store failures are returned unchanged.
    pub fn available(&self, kind: ResourceKind) -> Result<u32, SimulationError> {
        self.state(kind).map(|s| s.available)
    }

    /// Current capacity of a resource.
    pub fn capacity(&self, kind: ResourceKind) -> u32 {
        self.slot(kind).limits.lock().capacity
    }

    /// Units still in use beyond the current capacity.
    pub fn debt(&self, kind: ResourceKind) -> u32 {
        self.slot(kind).limits.lock().debt
    }

    /// Wake signal fired on release, capacity increase and enqueue.
    pub fn waker(&self, kind: ResourceKind) -> Arc<Notify> {
        Arc::clone(&self.slot(kind).wake)
    }

    /// Backing store shared with the queues.
    pub fn store(&self) -> Arc<dyn ResourceStore> {
        Arc::clone(&self.store)
    }
}
