//! CDT lifecycle engine
//!
//! Drives fixed-term deposits through their status lifecycle, keeps an
//! append-only audit trail, and keeps the in-process read cache coherent
//! with the authoritative `cdt_storage` backend.
//!
//! ## Mutation pipeline
//!
//! ```text
//! caller ─► CdtService ─► validate ─► CdtStore ─► AuditLog ─► InvalidationPlan ─► Mutation<T>
//!                         (no side      (persist)   (best-      (applied to
//!                          effects on               effort)      CacheStore)
//!                          failure)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cdt_engine::{Actor, CacheStore, CdtService, EngineConfig, NewCdt};
//! use cdt_storage::SqliteCdtStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteCdtStore::new("cdts.db")?);
//! let cache = Arc::new(CacheStore::new()?);
//! let service = CdtService::with_store(store, cache, EngineConfig::from_yaml("cdt.yaml")?);
//! let _sweeper = service.spawn_cache_sweeper();
//!
//! let created = service.create(&Actor::user("42"), new_cdt).await?;
//! service.submit_for_review(&created.value.id, &Actor::user("42")).await?;
//! service.approve(&created.value.id, &Actor::admin("1"), None).await?;
//! ```

pub mod audit;
pub mod cache;
pub mod coherence;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditLog, AuditWrite};
pub use cache::{CacheError, CacheMetricsSnapshot, CacheStore, SweeperHandle};
pub use coherence::InvalidationPlan;
pub use config::{CacheSettings, CdtBounds, ConfigError, EngineConfig, Validatable};
pub use error::{CdtError, Result};
pub use lifecycle::{
    validate_transition, Actor, CachedValue, CdtPatch, CdtService, MaturitySweep, Mutation, NewCdt,
    Role,
};
pub use logging::init_tracing;
