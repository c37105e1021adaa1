//! Domain layer for CDT storage
//!
//! # Domain Models
//!
//! - `Cdt`: fixed-term deposit entity
//! - `AuditLogEntry`: append-only ledger row, cascade-deleted with its CDT
//!
//! # Port Traits
//!
//! - `CdtStore`: authoritative CDT persistence
//! - `AuditLogStore`: append-only audit persistence

pub mod models;
pub mod ports;

pub use models::{
    AuditLogEntry, Cdt, CdtFilter, CdtId, CdtPage, CdtStats, CdtStatus, RenovationOption,
    TransitionStamp, UserId,
};
pub use ports::{AuditLogStore, CdtStore};
