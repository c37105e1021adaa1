//! Best-effort audit trail
//!
//! A failed audit write never fails the business operation that caused it.
//! The failure is logged and handed back as `AuditWrite::Degraded` so callers
//! can see it without having to handle an error.

use cdt_storage::{AuditLogEntry, AuditLogStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;

/// Action tags written by the lifecycle engine
pub mod actions {
    pub const CREATED: &str = "created";
    pub const UPDATED: &str = "updated";
    pub const SUBMITTED: &str = "submitted";
    pub const APPROVED: &str = "approved";
    pub const REJECTED: &str = "rejected";
    pub const CANCELLED: &str = "cancelled";
    pub const COMPLETED: &str = "completed";
    pub const DELETED: &str = "deleted";
}

/// Outcome of an audit write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditWrite {
    Recorded,
    Degraded { reason: String },
}

impl AuditWrite {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditWrite::Recorded)
    }
}

/// Writer over an `AuditLogStore`
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditLogStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditLogStore>) -> Self {
        Self { store }
    }

    /// Append one entry; never fails
    pub async fn record(&self, cdt_id: &str, action: &str, details: serde_json::Value) -> AuditWrite {
        let entry = AuditLogEntry::new(cdt_id, action, details);
        match self.store.append(&entry).await {
            Ok(()) => {
                debug!(cdt_id, action, "audit recorded");
                AuditWrite::Recorded
            }
            Err(err) => {
                warn!(cdt_id, action, error = %err, "audit write failed");
                AuditWrite::Degraded {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Entries for `cdt_id`, newest first
    pub async fn list_for(&self, cdt_id: &str) -> Result<Vec<AuditLogEntry>> {
        Ok(self.store.list_for(cdt_id).await?)
    }
}
