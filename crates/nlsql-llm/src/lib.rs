//! LLM Gateway crate: provider abstraction, retry/fallback policy, and
//! best-effort JSON extraction from completion text.

pub mod error;
pub mod fakes;
pub mod gateway;
pub mod google;
pub mod json_repair;
pub mod openai;
pub mod provider;

pub use error::ProviderError;
pub use gateway::{LlmGateway, RetryPolicy};
pub use google::GoogleProvider;
pub use json_repair::{repair_and_parse, strip_code_fences};
pub use openai::OpenAiProvider;
pub use provider::{CompletionRequest, CompletionResponse, Provider};
