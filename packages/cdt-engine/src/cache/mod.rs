//! In-process cache
//!
//! - `CacheStore`: TTL map with pattern and dependency-tag invalidation
//! - `CacheMetrics`: Prometheus counters behind `CacheStore::metrics`
//! - `SweeperHandle`: background expiry task

pub mod error;
pub mod metrics;
pub mod store;
pub mod sweeper;

pub use error::{CacheError, CacheResult};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use store::{glob_match, CacheEntry, CacheStore};
pub use sweeper::SweeperHandle;
