//! Prometheus metrics for the CDT cache

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};
use serde::Serialize;

use super::error::CacheResult;

/// Live counters backing a `CacheStore`
#[derive(Clone)]
pub struct CacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub sets: IntCounter,
    pub deletes: IntCounter,
    /// Entries removed by pattern or tag invalidation
    pub invalidations: IntCounter,
    /// Entries dropped because their TTL elapsed (lazy or swept)
    pub expired: IntCounter,
    pub entries: IntGauge,
}

impl CacheMetrics {
    pub fn new(registry: &Registry) -> CacheResult<Self> {
        Ok(Self {
            hits: register_int_counter_with_registry!(
                Opts::new("cdt_cache_hits_total", "CDT cache hits"),
                registry
            )?,
            misses: register_int_counter_with_registry!(
                Opts::new("cdt_cache_misses_total", "CDT cache misses"),
                registry
            )?,
            sets: register_int_counter_with_registry!(
                Opts::new("cdt_cache_sets_total", "CDT cache writes"),
                registry
            )?,
            deletes: register_int_counter_with_registry!(
                Opts::new("cdt_cache_deletes_total", "CDT cache explicit deletes"),
                registry
            )?,
            invalidations: register_int_counter_with_registry!(
                Opts::new(
                    "cdt_cache_invalidations_total",
                    "CDT cache entries removed by pattern or tag"
                ),
                registry
            )?,
            expired: register_int_counter_with_registry!(
                Opts::new("cdt_cache_expired_total", "CDT cache entries dropped on TTL"),
                registry
            )?,
            entries: register_int_gauge_with_registry!(
                Opts::new("cdt_cache_entries", "CDT cache entry count"),
                registry
            )?,
        })
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.get(),
            misses: self.misses.get(),
            sets: self.sets.get(),
            deletes: self.deletes.get(),
            invalidations: self.invalidations.get(),
            expired: self.expired.get(),
            size: self.entries.get().max(0) as u64,
        }
    }

    /// Zero every counter; the entry gauge tracks live state and is kept
    pub fn reset(&self) {
        self.hits.reset();
        self.misses.reset();
        self.sets.reset();
        self.deletes.reset();
        self.invalidations.reset();
        self.expired.reset();
    }
}

/// Point-in-time copy of the cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub invalidations: u64,
    pub expired: u64,
    pub size: u64,
}

impl CacheMetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits as f64;
        let total = hits + self.misses as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    pub fn miss_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }
}
