//! Error types for the lifecycle engine

use cdt_storage::{CdtStatus, StorageError};
use thiserror::Error;

/// Lifecycle error
///
/// Every variant except `Storage` is raised before any side effect, so a
/// failed call leaves the store, the audit log and the cache untouched.
#[derive(Debug, Error)]
pub enum CdtError {
    #[error("CDT not found: {id}")]
    NotFound { id: String },

    #[error("User {user_id} may not {action} CDT {id}")]
    Forbidden {
        id: String,
        user_id: String,
        action: &'static str,
    },

    #[error("Invalid state for CDT {id}: {current} does not allow {attempted}")]
    InvalidState {
        id: String,
        current: CdtStatus,
        /// Target status, or the operation name for non-transitions
        attempted: &'static str,
    },

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CdtError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn forbidden(id: impl Into<String>, user_id: impl Into<String>, action: &'static str) -> Self {
        Self::Forbidden {
            id: id.into(),
            user_id: user_id.into(),
            action,
        }
    }

    pub fn invalid_state(id: impl Into<String>, current: CdtStatus, attempted: &'static str) -> Self {
        Self::InvalidState {
            id: id.into(),
            current,
            attempted,
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CdtError>;
