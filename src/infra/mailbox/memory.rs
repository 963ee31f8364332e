//! In-memory mailbox backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::{Mailbox, Notification, SimulationError};
use crate::util::serde::CallbackRef;

/// Mailbox message container.
#[derive(Debug, Clone)]
pub struct MailboxMessage {
    /// Delivered outcome.
    pub notification: Notification,
    /// Wall-clock delivery time in milliseconds.
    pub created_at_ms: u128,
}

/// Simple in-memory mailbox for development/testing.
#[derive(Default)]
pub struct InMemoryMailbox {
    messages: Mutex<HashMap<CallbackRef, Vec<MailboxMessage>>>,
    arrived: Notify,
}

impl InMemoryMailbox {
    /// Create a new mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch messages for a callback, optionally since a timestamp.
    pub fn fetch(
        &self,
        callback: &CallbackRef,
        since_ms: Option<u128>,
        limit: usize,
    ) -> Vec<MailboxMessage> {
        self.messages
            .lock()
            .get(callback)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| since_ms.map_or(true, |s| m.created_at_ms >= s))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First notification delivered to a callback.
    pub fn first(&self, callback: &CallbackRef) -> Option<Notification> {
        self.messages
            .lock()
            .get(callback)
            .and_then(|msgs| msgs.first())
            .map(|m| m.notification.clone())
    }

    /// Remove and return every message of a callback, dropping its key.
    pub fn take(&self, callback: &CallbackRef) -> Vec<MailboxMessage> {
        self.messages.lock().remove(callback).unwrap_or_default()
    }

    /// Callbacks holding at least one message.
    pub fn callbacks(&self) -> usize {
        self.messages.lock().len()
    }

    /// Total messages across all callbacks.
    pub fn len(&self) -> usize {
        self.messages.lock().values().map(Vec::len).sum()
    }

    /// Whether nothing was delivered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until a callback has a message, up to `timeout`.
    pub async fn wait_for(&self, callback: &CallbackRef, timeout: Duration) -> Option<Notification> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Registered before the check so a delivery in between is not lost.
            let arrived = self.arrived.notified();
            if let Some(found) = self.first(callback) {
                return Some(found);
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                return self.first(callback);
            }
        }
    }
}

#[async_trait]
impl Mailbox for InMemoryMailbox {
    async fn deliver(
        &self,
        callback: &CallbackRef,
        notification: Notification,
    ) -> Result<(), SimulationError> {
        self.messages
            .lock()
            .entry(callback.clone())
            .or_default()
            .push(MailboxMessage {
                notification,
                created_at_ms: crate::util::clock::now_ms(),
            });
        self.arrived.notify_waiters();
        Ok(())
    }
}
