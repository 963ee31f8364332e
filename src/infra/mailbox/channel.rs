//! Mailbox forwarding every notification over a crossbeam channel.

use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender};

use crate::core::{Mailbox, Notification, SimulationError};
use crate::util::serde::CallbackRef;

/// Callback reference paired with its outcome.
pub type Envelope = (CallbackRef, Notification);

/// Mailbox handing notifications to a consumer thread.
#[derive(Clone)]
pub struct ChannelMailbox {
    tx: Sender<Envelope>,
}

impl ChannelMailbox {
    /// Unbounded mailbox and the receiving end.
    pub fn unbounded() -> (Self, Receiver<Envelope>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Mailbox for ChannelMailbox {
    async fn deliver(
        &self,
        callback: &CallbackRef,
        notification: Notification,
    ) -> Result<(), SimulationError> {
        self.tx
            .send((callback.clone(), notification))
            .map_err(|_| SimulationError::Delivery(format!("receiver for {callback} dropped")))
    }
}
