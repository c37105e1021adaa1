//! CDT Store - authoritative persistence for fixed-term deposits
//!
//! ## Core Principles
//!
//! 1. **Single source of truth**: the store is authoritative; caches and the
//!    audit log are derived or secondary.
//! 2. **Append-only audit**: entries are never updated; they leave only by
//!    cascade when their CDT is deleted.
//! 3. **Status by compare-and-set**: `transition_status` refuses to overwrite
//!    a status that changed underneath the caller.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cdt_storage::{CdtStore, AuditLogStore, SqliteCdtStore, CdtFilter};
//!
//! let store = SqliteCdtStore::new("cdts.db")?;
//! store.insert(&cdt).await?;
//!
//! let page = store.list(&CdtFilter::for_owner("42")).await?;
//! let history = store.list_for(&cdt.id).await?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    AuditLogEntry, AuditLogStore, Cdt, CdtFilter, CdtId, CdtPage, CdtStats, CdtStatus, CdtStore,
    RenovationOption, TransitionStamp, UserId,
};

pub use infrastructure::InMemoryCdtStore;
#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteCdtStore;
