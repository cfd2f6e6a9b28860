//! Deterministic test doubles for [`crate::provider::Provider`], exported so
//! downstream crates can exercise the gateway and pipeline stages without
//! real network calls.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::ProviderError;
use crate::provider::{CompletionRequest, CompletionResponse, Provider};

/// A provider that always returns a fixed completion.
pub struct FixedProvider {
    name: String,
    response_text: String,
}

impl FixedProvider {
    pub fn new(name: impl Into<String>, response_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_text: response_text.into(),
        }
    }
}

#[async_trait]
impl Provider for FixedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        Ok(CompletionResponse {
            text: self.response_text.clone(),
            provider_name: self.name.clone(),
            latency_ms: 0,
        })
    }
}

/// A provider that pops canned responses off a queue in order, erroring once
/// the queue is exhausted. Useful for asserting a stage consumes exactly N
/// completions.
pub struct ScriptedProvider {
    name: String,
    responses: Mutex<Vec<Result<String, ProviderError>>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>, responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            return Err(ProviderError::Unavailable("scripted responses exhausted".to_string()));
        }
        match queue.remove(0) {
            Ok(text) => Ok(CompletionResponse {
                text,
                provider_name: self.name.clone(),
                latency_ms: 0,
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_provider_always_returns_same_text() {
        let provider = FixedProvider::new("fixed", "hello");
        let request = CompletionRequest::new("sys", "user");
        let r1 = provider.complete(&request).await.unwrap();
        let r2 = provider.complete(&request).await.unwrap();
        assert_eq!(r1.text, "hello");
        assert_eq!(r2.text, "hello");
    }

    #[tokio::test]
    async fn test_scripted_provider_exhausts_queue() {
        let provider = ScriptedProvider::new("scripted", vec![Ok("first".to_string())]);
        let request = CompletionRequest::new("sys", "user");
        assert_eq!(provider.complete(&request).await.unwrap().text, "first");
        assert!(provider.complete(&request).await.is_err());
    }
}
