//! Per-mutation invalidation plans
//!
//! Every mutation of a CDT `X` owned by `U` drops the same conservative set:
//! `cdt:X`, every list page of `U`, every admin list page, `admin_stats`,
//! `pending_cdts`, and anything tagged `cdt:X` or `owner:U`.

use serde::Serialize;

use super::keys;
use crate::cache::CacheStore;

/// Explicit set of cache entries a mutation invalidates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationPlan {
    pub keys: Vec<String>,
    pub patterns: Vec<String>,
    pub tags: Vec<String>,
}

impl InvalidationPlan {
    /// Plan for any mutation of CDT `id` owned by `owner`
    pub fn for_cdt(id: &str, owner: &str) -> Self {
        Self {
            keys: vec![
                keys::cdt(id),
                keys::ADMIN_STATS.to_string(),
                keys::PENDING_CDTS.to_string(),
            ],
            patterns: vec![
                keys::owner_lists_pattern(owner),
                keys::ALL_LISTS_PATTERN.to_string(),
            ],
            tags: vec![keys::tags::cdt(id), keys::tags::owner(owner)],
        }
    }

    /// Union of several plans, without duplicates
    pub fn merge(mut self, other: InvalidationPlan) -> Self {
        for key in other.keys {
            if !self.keys.contains(&key) {
                self.keys.push(key);
            }
        }
        for pattern in other.patterns {
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
        for tag in other.tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.patterns.is_empty() && self.tags.is_empty()
    }

    /// Drop every planned entry from `cache`, returning how many were removed
    pub fn apply<V>(&self, cache: &CacheStore<V>) -> usize {
        let mut removed = 0;
        for key in &self.keys {
            if cache.delete(key) {
                removed += 1;
            }
        }
        for pattern in &self.patterns {
            removed += cache.invalidate_pattern(pattern);
        }
        for tag in &self.tags {
            removed += cache.invalidate_tag(tag);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_storage::CdtFilter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_contents() {
        let plan = InvalidationPlan::for_cdt("abc", "42");
        assert_eq!(plan.keys, vec!["cdt:abc", "admin_stats", "pending_cdts"]);
        assert_eq!(plan.patterns, vec!["cdts:user:42:*", "cdts:all:*"]);
        assert_eq!(plan.tags, vec!["cdt:abc", "owner:42"]);
    }

    #[test]
    fn test_merge_deduplicates() {
        let plan = InvalidationPlan::for_cdt("a", "42").merge(InvalidationPlan::for_cdt("b", "42"));
        assert_eq!(plan.keys.len(), 4);
        assert_eq!(plan.patterns.len(), 2);
        assert_eq!(plan.tags, vec!["cdt:a", "owner:42", "cdt:b"]);
        assert!(InvalidationPlan::default().is_empty());
    }

    #[test]
    fn test_apply_leaves_unrelated_entries() {
        let cache: CacheStore<u32> = CacheStore::new().unwrap();
        cache.set(keys::cdt("abc"), 1, None);
        cache.set(keys::cdt("99"), 2, None);
        cache.set(keys::list(&CdtFilter::for_owner("42")), 3, None);
        cache.set(keys::list(&CdtFilter::for_owner("43")), 4, None);
        cache.set(keys::list(&CdtFilter::default()), 5, None);
        cache.set(keys::ADMIN_STATS, 6, None);
        // a foreign key that only declared a dependency on the CDT
        cache.set_with_tags("report:monthly", 7, None, [keys::tags::cdt("abc")]);

        let removed = InvalidationPlan::for_cdt("abc", "42").apply(&cache);
        assert_eq!(removed, 5);
        assert_eq!(
            cache.keys(),
            vec![
                "cdt:99".to_string(),
                "cdts:user:43:status:all:page:1:limit:10".to_string()
            ]
        );
    }
}
