//! The LLM Gateway: wraps one or more [`Provider`]s with retry, exponential
//! backoff, and ordered fallback.

use std::time::Duration;

use tracing::warn;

use crate::error::ProviderError;
use crate::provider::{CompletionRequest, CompletionResponse, Provider};

/// Bounded retry/backoff policy for a single provider call.
///
/// Defaults mirror the original service's `tenacity` retry decorator
/// (`stop_after_attempt(3)`, `wait_exponential`) and the taxonomy's own
/// `max_attempts: 3` default for bounded recovery loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry attempt `attempt` (1-indexed), capped, with a
    /// deterministic pseudo-jitter derived from the attempt number so two
    /// concurrent callers don't retry in lockstep.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(8));
        let capped = exp.min(self.max_delay);
        let jitter_millis = (attempt as u64 * 137) % 250;
        capped + Duration::from_millis(jitter_millis)
    }
}

/// Gateway over an ordered list of providers: the first is tried with
/// retries per [`RetryPolicy`]; on exhaustion (or if it's unavailable) the
/// next provider in the list is tried fresh.
pub struct LlmGateway {
    providers: Vec<Box<dyn Provider>>,
    retry_policy: RetryPolicy,
}

impl LlmGateway {
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self {
            providers,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run `request` against the provider chain, retrying retryable errors
    /// within a provider before falling through to the next one.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut last_err = ProviderError::Unavailable("no providers configured".to_string());

        for provider in &self.providers {
            match self.complete_with_retries(provider.as_ref(), request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider exhausted, falling back");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn complete_with_retries(
        &self,
        provider: &dyn Provider,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match provider.complete(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry_policy.max_attempts => {
                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        provider = provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying provider call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyProvider {
        name: String,
        fail_times: Arc<AtomicU32>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(ProviderError::Overloaded("try again".to_string()));
            }
            Ok(CompletionResponse {
                text: "ok".to_string(),
                provider_name: self.name.clone(),
                latency_ms: 1,
            })
        }
    }

    struct AlwaysInvalidProvider;

    #[async_trait]
    impl Provider for AlwaysInvalidProvider {
        fn name(&self) -> &str {
            "always_invalid"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            Err(ProviderError::Invalid("bad prompt".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failure_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = FlakyProvider {
            name: "primary".to_string(),
            fail_times: Arc::new(AtomicU32::new(1)),
            calls: calls.clone(),
        };
        let gateway = LlmGateway::new(vec![Box::new(provider)]);
        let request = CompletionRequest::new("sys", "hello");

        let result = gateway.complete(&request).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_does_not_retry() {
        let gateway = LlmGateway::new(vec![Box::new(AlwaysInvalidProvider)]);
        let request = CompletionRequest::new("sys", "hello");

        let result = gateway.complete(&request).await;
        assert!(matches!(result, Err(ProviderError::Invalid(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_second_provider_after_exhausting_first() {
        let calls = Arc::new(AtomicU32::new(0));
        let always_overloaded = FlakyProvider {
            name: "primary".to_string(),
            fail_times: Arc::new(AtomicU32::new(100)),
            calls: calls.clone(),
        };
        let fallback = FlakyProvider {
            name: "fallback".to_string(),
            fail_times: Arc::new(AtomicU32::new(0)),
            calls: Arc::new(AtomicU32::new(0)),
        };

        let gateway = LlmGateway::new(vec![Box::new(always_overloaded), Box::new(fallback)]);
        let request = CompletionRequest::new("sys", "hello");

        let result = gateway.complete(&request).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().provider_name, "fallback");
    }
}
