//! # storage-adapters
//!
//! Implementations of the `MessageRepository` port.
//!
//! - [`memory::MemoryMessageRepository`]: always compiled, used by tests and
//!   single-process deployments.
//! - [`sqlite::SqliteMessageRepository`]: feature `db-sqlite`.

pub mod memory;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use memory::MemoryMessageRepository;
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteMessageRepository;
