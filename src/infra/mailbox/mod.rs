//! Mailbox backends.

#[cfg(not(target_arch = "wasm32"))]
pub mod channel;
pub mod memory;

#[cfg(not(target_arch = "wasm32"))]
pub use channel::{ChannelMailbox, Envelope};
pub use memory::{InMemoryMailbox, MailboxMessage};
