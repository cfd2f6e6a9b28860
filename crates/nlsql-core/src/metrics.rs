//! Global atomic counters for pipeline observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single `tracing::info!`
//! event (e.g. at the end of a request or on a periodic tick).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters — no allocations, no locking.
pub struct Metrics {
    requests_total: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    llm_retries: AtomicU64,
    safety_rejections: AtomicU64,
    fanout_backend_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            llm_retries: AtomicU64::new(0),
            safety_rejections: AtomicU64::new(0),
            fanout_backend_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_llm_retries(&self) {
        self.llm_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_safety_rejections(&self) {
        self.safety_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fanout_failures(&self) {
        self.fanout_backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            requests_total = self.requests_total(),
            cache_hits = self.cache_hits(),
            cache_misses = self.cache_misses.load(Ordering::Relaxed),
            llm_retries = self.llm_retries.load(Ordering::Relaxed),
            safety_rejections = self.safety_rejections.load(Ordering::Relaxed),
            fanout_backend_failures = self.fanout_backend_failures.load(Ordering::Relaxed),
        );
    }
}
