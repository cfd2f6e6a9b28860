//! Generic TTL cache entry shared by the Schema Cache (C2) and Result Cache
//! (C3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub hit_count: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, value: T, ttl_secs: u64) -> Self {
        Self {
            key: key.into(),
            value,
            created_at: Utc::now(),
            ttl_secs,
            hit_count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.created_at).num_seconds().max(0) as u64;
        age > self.ttl_secs
    }

    pub fn record_hit(&mut self) {
        self.hit_count += 1;
    }
}
