//! Composition root: wires the Registry, Schema Cache, Result Cache, LLM
//! Gateway, and Executor into one Orchestrator, plus the consolidated
//! metadata store. Constructed once at process start and passed by handle
//! — no global mutable singletons outside the caches the Orchestrator
//! already owns (§5, §9).

use std::sync::Arc;

use nlsql_core::{Config, Orchestrator, Registry, ResultCache, SchemaCache};
use nlsql_exec::SqlExecutor;
use nlsql_llm::{GoogleProvider, LlmGateway, OpenAiProvider};
use nlsql_metastore::MetastoreHandle;

/// The assembled pipeline plus the out-of-band metadata store, shared
/// behind an `Arc` by every request handler.
pub struct App {
    pub orchestrator: Orchestrator<Arc<SqlExecutor>, Arc<SqlExecutor>>,
    pub registry: Registry,
    pub metastore: MetastoreHandle,
}

impl App {
    /// Build the full pipeline from environment configuration. LLM
    /// providers are optional — with none configured, the Orchestrator's
    /// stages fall back to their deterministic paths (keyword intent
    /// classification, sentinel SQL) per §6.
    pub async fn from_env() -> anyhow::Result<Self> {
        let config = Config::from_env();
        let registry = Registry::from_config(&config);

        let executor = Arc::new(SqlExecutor::new(registry.clone()));
        let schema_cache = SchemaCache::new(executor.clone());
        let result_cache = ResultCache::new();
        let gateway = build_gateway(&config);
        let metastore = MetastoreHandle::setup_db().await?;

        let orchestrator = Orchestrator::new(registry.clone(), schema_cache, result_cache, gateway, executor);

        Ok(Self { orchestrator, registry, metastore })
    }
}

/// Build the LLM Gateway's provider chain: OpenAI primary, Google
/// fallback, matching the order `{OPENAI_API_KEY, GOOGLE_API_KEY}` is
/// listed in §6. An empty chain is valid — [`LlmGateway::is_empty`]
/// is how every LLM-dependent stage detects "no provider configured".
fn build_gateway(config: &Config) -> LlmGateway {
    let mut providers: Vec<Box<dyn nlsql_llm::Provider>> = Vec::new();

    if let Some(key) = &config.openai_api_key {
        providers.push(Box::new(OpenAiProvider::new(key.clone(), "gpt-4o-mini")));
    }
    if let Some(key) = &config.google_api_key {
        providers.push(Box::new(GoogleProvider::new(key.clone(), "gemini-1.5-flash")));
    }

    if providers.is_empty() {
        tracing::warn!("no LLM provider credentials configured; falling back to deterministic paths");
    }

    LlmGateway::new(providers)
}

pub type SharedApp = Arc<App>;
