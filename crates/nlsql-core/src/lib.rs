//! nlsql-core: domain model, stage implementations, and the Orchestrator
//! that sequences them into a natural-language-to-SQL query pipeline.

pub mod config;
pub mod domain;
pub mod error;
pub mod intent_extractor;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod result_cache;
pub mod safety;
pub mod schema_cache;
pub mod synth;
pub mod telemetry;
pub mod viz;

pub use config::Config;
pub use error::{NlSqlError, Result};
pub use orchestrator::{Envelope, EnvelopeStatus, Mode, Orchestrator, QueryExecutor, Request};
pub use registry::Registry;
pub use result_cache::ResultCache;
pub use schema_cache::{SchemaCache, SchemaFetcher};
