//! Centralised tracing initialisation for nlsql binaries.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting.
//!
//! Safe to call more than once — subsequent calls are silently ignored
//! (the global subscriber can only be set once per process).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json` — when `true`, emit newline-delimited JSON log lines.
/// * `level` — default verbosity when `RUST_LOG` is not set.
///
/// Respects the `RUST_LOG` environment variable for fine-grained filtering.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Emit a stage-started event with structured fields.
pub fn emit_stage_started(request_id: &str, stage: &str) {
    tracing::info!(event = "stage.started", request_id = %request_id, stage = %stage);
}

/// Emit a stage-finished event, recording whether it succeeded.
pub fn emit_stage_finished(request_id: &str, stage: &str, success: bool, duration_ms: u64) {
    tracing::info!(
        event = "stage.finished",
        request_id = %request_id,
        stage = %stage,
        success = success,
        duration_ms = duration_ms,
    );
}

/// Emit a cache hit/miss event for one of the three caches.
pub fn emit_cache_event(cache: &str, key: &str, hit: bool) {
    tracing::debug!(event = "cache.lookup", cache = %cache, key = %key, hit = hit);
}

/// Emit a safety-gate rejection event.
pub fn emit_safety_rejection(request_id: &str, reason: &str) {
    tracing::warn!(event = "safety.rejected", request_id = %request_id, reason = %reason);
}
