//! C3 Result Cache: TTL cache of [`ResultSet`]s keyed by
//! [`crate::domain::digest::result_cache_key`].

use dashmap::DashMap;

use crate::domain::cache_entry::CacheEntry;
use crate::domain::digest::result_cache_key;
use crate::domain::{ContentDigest, ResultSet};

/// Default TTL for a cached result: five minutes. Result data goes stale
/// faster than schema, since the underlying rows can change between queries.
pub const DEFAULT_RESULT_TTL_SECS: u64 = 300;

/// Caches executed query results by content digest. Unlike the schema
/// cache, this never triggers a refresh itself — the executor always
/// produces the value; the cache only decides whether to reuse a prior one.
pub struct ResultCache {
    ttl_secs: u64,
    entries: DashMap<ContentDigest, CacheEntry<ResultSet>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_RESULT_TTL_SECS)
    }

    pub fn with_ttl(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            entries: DashMap::new(),
        }
    }

    pub fn key_for(backend_id: &str, sql: &str, params: &serde_json::Value) -> ContentDigest {
        result_cache_key(backend_id, sql, params)
    }

    /// Look up a cached, non-expired result. Records a cache hit on the
    /// entry and in the global metrics on success.
    pub fn get(&self, key: &ContentDigest) -> Option<ResultSet> {
        let Some(mut entry) = self.entries.get_mut(key) else {
            crate::metrics::METRICS.inc_cache_miss();
            crate::telemetry::emit_cache_event("result", key.short(), false);
            return None;
        };
        if entry.is_expired(chrono::Utc::now()) {
            crate::metrics::METRICS.inc_cache_miss();
            crate::telemetry::emit_cache_event("result", key.short(), false);
            return None;
        }
        entry.record_hit();
        crate::metrics::METRICS.inc_cache_hit();
        crate::telemetry::emit_cache_event("result", key.short(), true);
        let mut result = entry.value.clone();
        result.cache_hit = true;
        Some(result)
    }

    pub fn put(&self, key: ContentDigest, result: ResultSet) {
        self.entries
            .insert(key.clone(), CacheEntry::new(key.as_str().to_string(), result, self.ttl_secs));
    }

    /// Drop every cached result that belongs to `backend_id`. Used when a
    /// backend's data is known to have changed (e.g. after a write) so stale
    /// reads aren't served.
    pub fn invalidate(&self, backend_id: &str) {
        self.entries.retain(|_, entry| entry.value.backend_id != backend_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(backend_id: &str) -> ResultSet {
        ResultSet::empty(backend_id, vec!["id".to_string()])
    }

    #[test]
    fn test_put_then_get_returns_value_with_cache_hit_flag() {
        let cache = ResultCache::new();
        let key = ResultCache::key_for("default", "SELECT 1", &serde_json::json!({}));
        cache.put(key.clone(), sample_result("default"));

        let hit = cache.get(&key).unwrap();
        assert!(hit.cache_hit);
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let cache = ResultCache::new();
        let key = ResultCache::key_for("default", "SELECT 1", &serde_json::json!({}));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_expired_entry_is_not_returned() {
        let cache = ResultCache::with_ttl(0);
        let key = ResultCache::key_for("default", "SELECT 1", &serde_json::json!({}));
        cache.put(key.clone(), sample_result("default"));
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_invalidate_drops_only_matching_backend() {
        let cache = ResultCache::new();
        let key_a = ResultCache::key_for("db_a", "SELECT 1", &serde_json::json!({}));
        let key_b = ResultCache::key_for("db_b", "SELECT 1", &serde_json::json!({}));
        cache.put(key_a.clone(), sample_result("db_a"));
        cache.put(key_b.clone(), sample_result("db_b"));

        cache.invalidate("db_a");
        assert!(cache.get(&key_a).is_none());
        assert!(cache.get(&key_b).is_some());
    }
}
