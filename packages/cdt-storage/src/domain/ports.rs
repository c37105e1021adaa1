//! Storage Ports (Trait Interfaces)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Development/Production: SQLite (single file, single connection)
//! - Testing: InMemory (fast unit tests)

use async_trait::async_trait;
use chrono::NaiveDate;

use super::models::{AuditLogEntry, Cdt, CdtFilter, CdtPage, CdtStats, CdtStatus, TransitionStamp};
use crate::Result;

/// CDT Store Port
///
/// The only source of truth for CDT entities. Every backend must implement
/// this trait.
#[async_trait]
pub trait CdtStore: Send + Sync {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // CRUD
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert a new CDT
    ///
    /// # Errors
    ///
    /// `ErrorKind::Conflict` if the id already exists
    async fn insert(&self, cdt: &Cdt) -> Result<()>;

    /// Get CDT by ID
    async fn get(&self, id: &str) -> Result<Option<Cdt>>;

    /// Overwrite every mutable column of an existing CDT
    ///
    /// # Errors
    ///
    /// `ErrorKind::CdtNotFound` if no row has `cdt.id`
    async fn update(&self, cdt: &Cdt) -> Result<()>;

    /// Delete a CDT and, by cascade, its audit entries
    ///
    /// Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Status transitions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Move `id` from `from` to `to`, applying `stamp`, and return the new row
    ///
    /// Compare-and-set on the current status: the store does not know the
    /// transition table, it only refuses to overwrite a status that changed
    /// underneath the caller.
    ///
    /// # Errors
    ///
    /// - `ErrorKind::CdtNotFound` if the row is gone
    /// - `ErrorKind::Conflict` if the stored status is not `from`
    async fn transition_status(
        &self,
        id: &str,
        from: CdtStatus,
        to: CdtStatus,
        stamp: TransitionStamp,
    ) -> Result<Cdt>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Queries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Paginated list, newest first
    async fn list(&self, filter: &CdtFilter) -> Result<CdtPage>;

    /// Every CDT currently in `status`, oldest submission first
    async fn list_by_status(&self, status: CdtStatus) -> Result<Vec<Cdt>>;

    /// Active CDTs whose `end_date <= as_of`
    async fn list_matured(&self, as_of: NaiveDate) -> Result<Vec<Cdt>>;

    /// Aggregate counts and active totals
    async fn stats(&self) -> Result<CdtStats>;
}

/// Audit Log Store Port
///
/// Append-only. There is deliberately no update or delete: entries disappear
/// only when their CDT is deleted.
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    /// Append one entry
    ///
    /// # Errors
    ///
    /// Backend errors, including a missing owning CDT.
    async fn append(&self, entry: &AuditLogEntry) -> Result<()>;

    /// Entries for a CDT, newest first
    async fn list_for(&self, cdt_id: &str) -> Result<Vec<AuditLogEntry>>;
}
