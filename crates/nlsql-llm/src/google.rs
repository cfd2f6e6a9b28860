//! Google Generative Language API (Gemini) provider — the fallback
//! configured behind OpenAI when `GOOGLE_API_KEY` is set.

use async_trait::async_trait;
use serde_json::json;

use crate::error::ProviderError;
use crate::provider::{CompletionRequest, CompletionResponse, Provider};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleProvider {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::builder()
                .user_agent("nlsql-llm-gateway/0.2")
                .build()
                .expect("failed to build reqwest client"),
        }
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let started = std::time::Instant::now();
        let body = json!({
            "contents": [{
                "parts": [{"text": format!("{}\n\n{}", request.system_prompt, request.user_prompt)}],
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        });

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(30_000)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ProviderError::Overloaded(format!("http status {status}")));
        }
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Invalid(format!("http {status}: {text}")));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedOutput(e.to_string()))?;

        let text = parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                ProviderError::MalformedOutput(
                    "missing candidates[0].content.parts[0].text".to_string(),
                )
            })?
            .to_string();

        Ok(CompletionResponse {
            text,
            provider_name: self.name().to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}
