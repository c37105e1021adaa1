//! Infrastructure layer - Storage adapters
//!
//! - SQLite adapter (persistent, default)
//! - In-memory adapter (tests)

pub mod memory_store;
pub use memory_store::InMemoryCdtStore;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;
#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteCdtStore;
