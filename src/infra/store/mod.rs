//! Resource store backends.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryResourceStore;
pub use sqlite::SqliteResourceStore;
