//! TTL cache with pattern and dependency-tag invalidation
//!
//! Keys are plain strings following the conventions in `coherence::keys`.
//! Expiry is lazy on `get` and eager through `cleanup` (or the background
//! sweeper). Every operation takes the single map lock, so a reader never
//! observes a half-applied invalidation.

use parking_lot::Mutex;
use prometheus::Registry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::error::CacheResult;
use super::metrics::{CacheMetrics, CacheMetricsSnapshot};
use super::sweeper::{self, SweeperHandle};

/// One cached value
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub value: Arc<V>,
    /// `None` never expires
    pub expires_at: Option<Instant>,
    pub created_at: Instant,
    /// Dependency tags this entry was registered under
    pub tags: Vec<String>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// tag → keys that declared it
    tags: HashMap<String, HashSet<String>>,
}

impl<V> Inner<V> {
    /// Remove `key` and unlink it from its tags
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(entry)
    }

    fn remove_all<'a>(&mut self, keys: impl IntoIterator<Item = &'a String>) -> usize {
        keys.into_iter()
            .filter(|key| self.remove(key).is_some())
            .count()
    }
}

/// In-process cache shared by the read path and the coherence protocol
pub struct CacheStore<V> {
    inner: Mutex<Inner<V>>,
    metrics: CacheMetrics,
}

impl<V> CacheStore<V> {
    /// Cache with metrics in a private registry
    pub fn new() -> CacheResult<Self> {
        Self::with_registry(&Registry::new())
    }

    /// Cache whose metrics are registered in `registry`
    ///
    /// # Errors
    ///
    /// `CacheError::Metrics` if the metric names are already registered there.
    pub fn with_registry(registry: &Registry) -> CacheResult<Self> {
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tags: HashMap::new(),
            }),
            metrics: CacheMetrics::new(registry)?,
        })
    }

    /// Fetch a live entry; an expired one is evicted and counts as a miss
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.metrics.hits.inc();
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.remove(key);
            self.metrics.expired.inc();
            self.sync_size(&inner);
        }
        self.metrics.misses.inc();
        None
    }

    /// Store `value`; a `None` or zero TTL never expires
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.set_with_tags(key, value, ttl, Vec::<String>::new());
    }

    /// Store `value` and register it under each dependency tag
    pub fn set_with_tags<I, T>(&self, key: impl Into<String>, value: V, ttl: Option<Duration>, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let key = key.into();
        let now = Instant::now();
        let mut tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        tags.sort();
        tags.dedup();

        let entry = CacheEntry {
            value: Arc::new(value),
            expires_at: ttl.filter(|d| !d.is_zero()).map(|d| now + d),
            created_at: now,
            tags,
        };

        let mut inner = self.inner.lock();
        inner.remove(&key);
        for tag in &entry.tags {
            inner
                .tags
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        inner.entries.insert(key, entry);
        self.metrics.sets.inc();
        self.sync_size(&inner);
    }

    /// Remove one key, returning whether it was present
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.remove(key).is_some();
        if removed {
            self.metrics.deletes.inc();
            self.sync_size(&inner);
        }
        removed
    }

    /// Remove every key matching `pattern` (`*` matches any substring)
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut inner = self.inner.lock();
        let matching: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        let removed = inner.remove_all(&matching);
        self.record_invalidations(&inner, removed);
        if removed > 0 {
            debug!(pattern, removed, "cache pattern invalidated");
        }
        removed
    }

    /// Remove every entry registered under `tag`
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut inner = self.inner.lock();
        let Some(keys) = inner.tags.remove(tag) else {
            return 0;
        };

        let removed = inner.remove_all(&keys);
        self.record_invalidations(&inner, removed);
        if removed > 0 {
            debug!(tag, removed, "cache tag invalidated");
        }
        removed
    }

    /// Sweep expired entries, returning how many were dropped
    pub fn cleanup(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let removed = inner.remove_all(&expired);
        if removed > 0 {
            self.metrics.expired.inc_by(removed as u64);
            self.sync_size(&inner);
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.tags.clear();
        self.sync_size(&inner);
    }

    /// Entry count, including expired entries not yet swept
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current keys, sorted (diagnostics)
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn record_invalidations(&self, inner: &Inner<V>, removed: usize) {
        if removed > 0 {
            self.metrics.invalidations.inc_by(removed as u64);
            self.sync_size(inner);
        }
    }

    fn sync_size(&self, inner: &Inner<V>) {
        self.metrics.entries.set(inner.entries.len() as i64);
    }
}

impl<V: Send + Sync + 'static> CacheStore<V> {
    /// Run `cleanup` every `interval` on a tokio task
    ///
    /// The task stops when the returned handle is shut down or dropped.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        sweeper::spawn(Arc::clone(self), interval)
    }
}

/// Anchored glob match where `*` is the only metacharacter
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let head = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(head) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // no `*` at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache() -> CacheStore<String> {
        CacheStore::new().unwrap()
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("cdts:user:42:*", "cdts:user:42:status:all:page:1:limit:10"));
        assert!(!glob_match("cdts:user:42:*", "cdts:user:43:status:all:page:1:limit:10"));
        assert!(!glob_match("cdts:user:4*", "cdt:99"));
        assert!(glob_match("admin_stats", "admin_stats"));
        assert!(!glob_match("admin_stats", "admin_stats_v2"));
        assert!(glob_match("*", ""));
        assert!(glob_match("cdts:*:page:1:*", "cdts:all:status:draft:page:1:limit:10"));
        assert!(!glob_match("cdts:*:page:1:*", "cdts:all:status:draft:page:2:limit:10"));
        // suffix may not overlap the consumed prefix
        assert!(!glob_match("ab*ba", "aba"));
    }

    #[test]
    fn test_set_get_delete() {
        let cache = cache();
        cache.set("cdt:1", "one".to_string(), None);

        assert_eq!(cache.get("cdt:1").as_deref(), Some(&"one".to_string()));
        assert!(cache.delete("cdt:1"));
        assert!(!cache.delete("cdt:1"));
        assert!(cache.get("cdt:1").is_none());

        let m = cache.metrics();
        assert_eq!((m.hits, m.misses, m.sets, m.deletes), (1, 1, 1, 1));
        assert_eq!(m.size, 0);
    }

    #[test]
    fn test_overwrite_replaces_tags() {
        let cache = cache();
        cache.set_with_tags("list", "a".to_string(), None, ["cdt:1"]);
        cache.set_with_tags("list", "b".to_string(), None, ["cdt:2"]);

        assert_eq!(cache.invalidate_tag("cdt:1"), 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate_tag("cdt:2"), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_pattern_is_scoped() {
        let cache = cache();
        cache.set("cdts:user:42:status:all:page:1:limit:10", "a".to_string(), None);
        cache.set("cdts:user:42:status:draft:page:1:limit:10", "b".to_string(), None);
        cache.set("cdts:user:43:status:all:page:1:limit:10", "c".to_string(), None);
        cache.set("cdt:99", "d".to_string(), None);

        assert_eq!(cache.invalidate_pattern("cdts:user:42:*"), 2);
        assert_eq!(
            cache.keys(),
            vec![
                "cdt:99".to_string(),
                "cdts:user:43:status:all:page:1:limit:10".to_string()
            ]
        );
        assert_eq!(cache.metrics().invalidations, 2);
    }

    #[test]
    fn test_tag_shared_by_many_keys() {
        let cache = cache();
        cache.set_with_tags("a", "a".to_string(), None, ["owner:42", "cdt:1"]);
        cache.set_with_tags("b", "b".to_string(), None, ["owner:42"]);
        cache.set_with_tags("c", "c".to_string(), None, ["owner:43"]);

        assert_eq!(cache.invalidate_tag("owner:42"), 2);
        assert_eq!(cache.keys(), vec!["c".to_string()]);
        // key `a` is gone, so its other tag no longer resolves
        assert_eq!(cache.invalidate_tag("cdt:1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_never_returned() {
        let cache = cache();
        cache.set("cdt:1", "one".to_string(), Some(Duration::from_secs(300)));
        cache.set("forever", "f".to_string(), Some(Duration::ZERO));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get("cdt:1").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("cdt:1").is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("forever").is_some());
        assert_eq!(cache.metrics().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_sweeps_only_expired() {
        let cache = cache();
        cache.set_with_tags("short", "s".to_string(), Some(Duration::from_secs(10)), ["t"]);
        cache.set("long", "l".to_string(), Some(Duration::from_secs(100)));
        cache.set("none", "n".to_string(), None);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.keys(), vec!["long".to_string(), "none".to_string()]);
        assert_eq!(cache.invalidate_tag("t"), 0);
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn test_clear_and_reset_metrics() {
        let cache = cache();
        cache.set("a", "a".to_string(), None);
        let _ = cache.get("a");
        cache.clear();
        cache.reset_metrics();

        assert!(cache.is_empty());
        assert_eq!(cache.metrics(), CacheMetricsSnapshot::default());
    }

    #[test]
    fn test_shared_registry_exposes_metrics() {
        let registry = Registry::new();
        let cache: CacheStore<u32> = CacheStore::with_registry(&registry).unwrap();
        cache.set("a", 1, None);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"cdt_cache_sets_total".to_string()));
        assert!(CacheStore::<u32>::with_registry(&registry).is_err());
    }
}
