//! Provider-facing error taxonomy.

use thiserror::Error;

/// Errors a [`crate::provider::Provider`] implementation may surface.
/// Distinguished so the gateway can decide what's worth retrying.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {0} is not configured (missing credential)")]
    Unavailable(String),

    #[error("provider rejected the request as invalid: {0}")]
    Invalid(String),

    #[error("provider is overloaded or rate-limited: {0}")]
    Overloaded(String),

    #[error("provider call timed out after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned malformed output: {0}")]
    MalformedOutput(String),
}

impl ProviderError {
    /// Whether the gateway should retry this failure against the same
    /// provider (as opposed to failing fast or falling back immediately).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Overloaded(_) | ProviderError::Timeout(_) | ProviderError::Transport(_)
        )
    }
}
