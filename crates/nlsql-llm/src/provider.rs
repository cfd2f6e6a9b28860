//! The `Provider` trait every LLM backend (OpenAI, Google, or a test fake)
//! implements, and the request/response envelope the gateway passes through
//! it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A single completion request sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Upper bound on response tokens; providers that don't support this
    /// knob ignore it.
    pub max_tokens: u32,
    /// Sampling temperature; `0.0` for the deterministic stages (synthesis,
    /// safety-adjacent calls).
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

/// A provider's raw completion output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub provider_name: String,
    pub latency_ms: u64,
}

/// An LLM backend. Implementations are expected to be cheap to clone /
/// cheap to hold behind an `Arc` — no per-call connection setup.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}
