//! C2 Schema Cache: single-flight, TTL-bounded schema snapshots per backend.
//!
//! The actual introspection (querying `information_schema` / `sqlite_master`)
//! lives behind the [`SchemaFetcher`] trait so this crate never depends on a
//! SQL driver directly — the executor crate supplies the real implementation,
//! the same inversion the storage traits module uses for its CAS/ledger
//! backends.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::cache_entry::CacheEntry;
use crate::domain::SchemaSnapshot;
use crate::error::Result;

/// Default TTL for a cached schema snapshot: one hour.
pub const DEFAULT_SCHEMA_TTL_SECS: u64 = 3600;

/// Introspects a backend's schema on demand. Implemented by the executor
/// crate against a real connection pool; test code can implement it directly
/// against canned data.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch_schema(&self, backend_id: &str) -> Result<SchemaSnapshot>;
}

type Slot = Arc<Mutex<Option<CacheEntry<SchemaSnapshot>>>>;

/// Per-backend cache of [`SchemaSnapshot`]s with single-flight refresh: two
/// concurrent callers for the same stale/missing key block on the same
/// refresh rather than issuing duplicate introspection queries.
pub struct SchemaCache<F: SchemaFetcher> {
    fetcher: F,
    ttl_secs: u64,
    entries: DashMap<String, Slot>,
}

impl<F: SchemaFetcher> SchemaCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_ttl(fetcher, DEFAULT_SCHEMA_TTL_SECS)
    }

    pub fn with_ttl(fetcher: F, ttl_secs: u64) -> Self {
        Self {
            fetcher,
            ttl_secs,
            entries: DashMap::new(),
        }
    }

    fn slot_for(&self, backend_id: &str) -> Slot {
        self.entries
            .entry(backend_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Return a fresh snapshot for `backend_id`, refreshing from the
    /// fetcher if the cached entry is missing or expired.
    pub async fn get(&self, backend_id: &str) -> Result<SchemaSnapshot> {
        let slot = self.slot_for(backend_id);
        let mut guard = slot.lock().await;

        let now = chrono::Utc::now();
        if let Some(entry) = guard.as_mut() {
            if !entry.is_expired(now) {
                entry.record_hit();
                crate::metrics::METRICS.inc_cache_hit();
                crate::telemetry::emit_cache_event("schema", backend_id, true);
                return Ok(entry.value.clone());
            }
        }

        crate::metrics::METRICS.inc_cache_miss();
        crate::telemetry::emit_cache_event("schema", backend_id, false);
        let snapshot = self.fetcher.fetch_schema(backend_id).await?;
        *guard = Some(CacheEntry::new(backend_id.to_string(), snapshot.clone(), self.ttl_secs));
        Ok(snapshot)
    }

    /// Force the next `get` for `backend_id` to refresh.
    pub fn invalidate(&self, backend_id: &str) {
        self.entries.remove(backend_id);
    }

    /// All currently cached snapshots, merged into one table list (§4.2).
    /// Does not trigger refreshes — callers should `get` each backend of
    /// interest first if freshness matters.
    pub async fn merged(&self) -> Vec<crate::domain::Table> {
        let mut snapshots = Vec::new();
        for entry in self.entries.iter() {
            if let Some(cached) = entry.value().lock().await.as_ref() {
                snapshots.push(cached.value.clone());
            }
        }
        SchemaSnapshot::merge(&snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SchemaFetcher for CountingFetcher {
        async fn fetch_schema(&self, backend_id: &str) -> Result<SchemaSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SchemaSnapshot::empty(backend_id, 3600))
        }
    }

    #[tokio::test]
    async fn test_second_get_is_cache_hit_not_another_fetch() {
        let cache = SchemaCache::new(CountingFetcher { calls: AtomicU32::new(0) });
        cache.get("default").await.unwrap();
        cache.get("default").await.unwrap();
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = SchemaCache::new(CountingFetcher { calls: AtomicU32::new(0) });
        cache.get("default").await.unwrap();
        cache.invalidate("default");
        cache.get("default").await.unwrap();
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_gets_single_flight() {
        let cache = Arc::new(SchemaCache::new(CountingFetcher { calls: AtomicU32::new(0) }));
        let a = cache.clone();
        let b = cache.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.get("default").await }),
            tokio::spawn(async move { b.get("default").await }),
        );
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
