//! Infrastructure adapters: resource stores, mailboxes and the arrival feed.

pub mod arrivals;
pub mod mailbox;
pub mod store;

pub use arrivals::ArrivalGenerator;
pub use mailbox::InMemoryMailbox;
#[cfg(not(target_arch = "wasm32"))]
pub use mailbox::ChannelMailbox;
pub use store::{InMemoryResourceStore, SqliteResourceStore};
