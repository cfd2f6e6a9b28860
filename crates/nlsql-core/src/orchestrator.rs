//! C10 Orchestrator: the state machine that sequences C5→C2→C6→C7→C8→C9 and
//! folds every stage's result into a uniform response envelope.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ChartSpec, Entity, Intent, ResultSet, SchemaSnapshot, SqlArtifact};
use crate::error::{NlSqlError, Result};
use crate::intent_extractor::{classify_intent, extract_entities, IntentResult};
use crate::registry::Registry;
use crate::result_cache::ResultCache;
use crate::safety::{self, GateOutcome};
use crate::schema_cache::{SchemaCache, SchemaFetcher};
use crate::synth::{synthesize, SynthesisInput};

const REQUEST_DEADLINE: Duration = Duration::from_secs(60);
const SCHEMA_REFRESH_DEADLINE: Duration = Duration::from_secs(10);
const EXECUTE_DEADLINE: Duration = Duration::from_secs(30);
const DEFAULT_MAX_ROWS: usize = 1000;

const CROSS_BACKEND_TRIGGERS: &[&str] = &["across databases", "all databases", "every database"];

/// Per-request execution mode (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Route,
    Coordinate,
    Collaborate,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Coordinate
    }
}

/// The uniform response envelope. Always well-formed; the Orchestrator
/// never throws across its own boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlates this response with the `stage.*`/`cache.*`/`safety.*`
    /// tracing events emitted while it was produced.
    pub request_id: String,
    pub status: EnvelopeStatus,
    pub sql: Option<String>,
    pub parameters: Option<serde_json::Value>,
    pub result: Option<ResultSet>,
    pub fanout_results: Option<HashMap<String, FanoutOutcome>>,
    pub visualization: Option<ChartSpec>,
    pub intent: Option<IntentEnvelope>,
    pub entities: Vec<Entity>,
    pub note: Option<String>,
    pub errors: Vec<EnvelopeError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FanoutOutcome {
    Ok(ResultSet),
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Success,
    Degraded,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentEnvelope {
    pub name: Intent,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub kind: String,
    pub message: String,
}

impl Envelope {
    fn success() -> Self {
        Self {
            request_id: String::new(),
            status: EnvelopeStatus::Success,
            sql: None,
            parameters: None,
            result: None,
            fanout_results: None,
            visualization: None,
            intent: None,
            entities: Vec::new(),
            note: None,
            errors: Vec::new(),
        }
    }

    fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            status: EnvelopeStatus::Error,
            sql: None,
            parameters: None,
            result: None,
            fanout_results: None,
            visualization: None,
            intent: None,
            entities: Vec::new(),
            note: None,
            errors: vec![EnvelopeError { kind: kind.into(), message: message.into() }],
        }
    }

    fn degrade(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.status = EnvelopeStatus::Degraded;
        self.errors.push(EnvelopeError { kind: kind.into(), message: message.into() });
        self
    }
}

/// A request as it enters the Orchestrator.
pub struct Request {
    pub utterance: String,
    pub backend_id: Option<String>,
    pub mode: Mode,
}

impl Request {
    /// Validate and construct a request; rejects an empty utterance (ported
    /// from the original pipeline's `query_not_empty` input validator).
    pub fn new(utterance: impl Into<String>, backend_id: Option<String>, mode: Mode) -> Result<Self> {
        let utterance = utterance.into();
        if utterance.trim().is_empty() {
            return Err(NlSqlError::InvalidRequest("utterance must not be empty".to_string()));
        }
        Ok(Self { utterance, backend_id, mode })
    }

    fn is_cross_backend(&self) -> bool {
        let lower = self.utterance.to_lowercase();
        CROSS_BACKEND_TRIGGERS.iter().any(|t| lower.contains(t))
    }
}

/// Abstraction over the Executor (C8), injected so this crate never depends
/// on a concrete SQL driver.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(
        &self,
        backend_id: &str,
        artifact: &SqlArtifact,
        timeout: Duration,
        max_rows: usize,
    ) -> Result<ResultSet>;

    async fn fan_out(
        &self,
        backend_ids: &[String],
        artifact: &SqlArtifact,
        timeout: Duration,
    ) -> HashMap<String, Result<ResultSet>>;
}

pub struct Orchestrator<F: SchemaFetcher, E: QueryExecutor> {
    registry: Registry,
    schema_cache: SchemaCache<F>,
    result_cache: ResultCache,
    gateway: nlsql_llm::LlmGateway,
    executor: E,
}

impl<F: SchemaFetcher, E: QueryExecutor> Orchestrator<F, E> {
    pub fn new(
        registry: Registry,
        schema_cache: SchemaCache<F>,
        result_cache: ResultCache,
        gateway: nlsql_llm::LlmGateway,
        executor: E,
    ) -> Self {
        Self { registry, schema_cache, result_cache, gateway, executor }
    }

    /// Expose the schema cache's per-backend view for `GET
    /// /databases/{id}/schema` — the HTTP surface reads through the same
    /// cache the pipeline itself uses, rather than introspecting twice.
    pub async fn schema_snapshot(&self, backend_id: &str) -> Result<SchemaSnapshot> {
        self.schema_cache.get(backend_id).await
    }

    /// Merged schema across every currently-cached backend, for `GET
    /// /databases/merged-schema`. Does not force a refresh; callers that
    /// need a guaranteed-fresh view should call `schema_snapshot` per
    /// backend first.
    pub async fn merged_schema(&self) -> Vec<crate::domain::Table> {
        self.schema_cache.merged().await
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run `request` through the full pipeline, producing a well-formed
    /// envelope in every case.
    pub async fn handle(&self, request: Request) -> Envelope {
        crate::metrics::METRICS.inc_requests();
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut envelope = match tokio::time::timeout(REQUEST_DEADLINE, self.handle_inner(&request, &request_id)).await {
            Ok(envelope) => envelope,
            Err(_) => Envelope::error("Timeout", "request exceeded its overall deadline"),
        };
        envelope.request_id = request_id;
        envelope
    }

    async fn handle_inner(&self, request: &Request, request_id: &str) -> Envelope {
        if self.registry.is_empty() {
            return Envelope::error("SchemaError", "no backends configured");
        }

        let cross_backend = request.is_cross_backend();

        let backend = if cross_backend {
            None
        } else {
            match self.registry.select(request.backend_id.as_deref()) {
                Ok(b) => Some(b.clone()),
                Err(e) => return Envelope::error("SchemaError", e.to_string()),
            }
        };

        // PARSE ∥ SCHEMA fork.
        let schema_ids: Vec<String> = if cross_backend {
            self.registry.list().iter().map(|b| b.id.clone()).collect()
        } else {
            vec![backend.as_ref().unwrap().id.clone()]
        };

        crate::telemetry::emit_stage_started(request_id, "parse_schema");
        let stage_started = std::time::Instant::now();
        let (intent_result, entities, snapshots) = {
            let schema_context = String::new();
            let intent_fut = classify_intent(&self.gateway, &request.utterance, &schema_context);
            let entities_fut = extract_entities(&self.gateway, &request.utterance, &schema_context);
            let schema_fut = self.fetch_schema_snapshots(&schema_ids);

            let (intent_result, entities, snapshots) = tokio::join!(intent_fut, entities_fut, schema_fut);
            (intent_result, entities, snapshots)
        };
        crate::telemetry::emit_stage_finished(request_id, "parse_schema", true, stage_started.elapsed().as_millis() as u64);

        let mut snapshots = snapshots;
        let needs_merged = !cross_backend
            && snapshots.first().map(SchemaSnapshot::is_empty).unwrap_or(true)
            && self.registry.list().len() > 1;
        if needs_merged {
            let all_ids: Vec<String> = self.registry.list().iter().map(|b| b.id.clone()).collect();
            snapshots = self.fetch_schema_snapshots(&all_ids).await;
        }

        if matches!(request.mode, Mode::Route) && intent_result.intent == Intent::SchemaInfo {
            return self.route_schema_info(&snapshots);
        }

        let dialect = backend
            .as_ref()
            .map(|b| b.dialect)
            .unwrap_or(crate::domain::Dialect::Unknown);

        let synthesis_input = SynthesisInput {
            utterance: &request.utterance,
            schema_snapshots: &snapshots,
            intent: intent_result.intent,
            dialect,
            cross_backend,
        };
        crate::telemetry::emit_stage_started(request_id, "synthesize");
        let synth_started = std::time::Instant::now();
        let artifact = synthesize(&self.gateway, synthesis_input).await;
        crate::telemetry::emit_stage_finished(
            request_id,
            "synthesize",
            !artifact.is_sentinel(),
            synth_started.elapsed().as_millis() as u64,
        );

        if artifact.text.trim().is_empty() {
            return self.degraded_envelope(intent_result, entities, None, "SqlGenerationError", "synthesis produced empty SQL");
        }

        let gate_backend = backend.clone().unwrap_or_else(|| self.registry.list()[0].clone());
        match safety::evaluate(&artifact, &gate_backend) {
            GateOutcome::Rejected(reason) => {
                crate::metrics::METRICS.inc_safety_rejections();
                crate::telemetry::emit_safety_rejection(request_id, &reason.to_string());
                let mut envelope = self.degraded_envelope(
                    intent_result,
                    entities,
                    Some(&artifact),
                    "SafetyRejection",
                    &reason.to_string(),
                );
                envelope.sql = Some(artifact.text.clone());
                return envelope;
            }
            GateOutcome::Ok => {}
        }

        crate::telemetry::emit_stage_started(request_id, "execute");
        let exec_started = std::time::Instant::now();
        let envelope = if cross_backend {
            self.execute_fanout(intent_result, entities, artifact, &schema_ids).await
        } else {
            self.execute_single(intent_result, entities, artifact, backend.unwrap(), request).await
        };
        crate::telemetry::emit_stage_finished(
            request_id,
            "execute",
            matches!(envelope.status, EnvelopeStatus::Success),
            exec_started.elapsed().as_millis() as u64,
        );
        envelope
    }

    /// Fetch every backend's snapshot concurrently — cross-backend requests
    /// (§4.10 fan-out) otherwise pay the full refresh latency once per
    /// backend instead of once overall.
    async fn fetch_schema_snapshots(&self, backend_ids: &[String]) -> Vec<SchemaSnapshot> {
        let fetches = backend_ids.iter().map(|id| async move {
            match tokio::time::timeout(SCHEMA_REFRESH_DEADLINE, self.schema_cache.get(id)).await {
                Ok(Ok(snapshot)) => snapshot,
                _ => SchemaSnapshot::empty(id.clone(), 0),
            }
        });
        futures::future::join_all(fetches).await
    }

    fn route_schema_info(&self, snapshots: &[SchemaSnapshot]) -> Envelope {
        let mut envelope = Envelope::success();
        envelope.note = Some(format!("{} table(s) across {} backend(s)", snapshots.iter().map(|s| s.tables.len()).sum::<usize>(), snapshots.len()));
        envelope
    }

    fn degraded_envelope(
        &self,
        intent_result: IntentResult,
        entities: Vec<Entity>,
        artifact: Option<&SqlArtifact>,
        kind: &str,
        message: &str,
    ) -> Envelope {
        let mut envelope = Envelope::success().degrade(kind, message);
        envelope.intent = Some(IntentEnvelope { name: intent_result.intent, confidence: intent_result.confidence });
        envelope.entities = entities;
        if let Some(a) = artifact {
            envelope.sql = Some(a.text.clone());
            envelope.parameters = Some(a.params.clone());
        }
        if artifact.map(|a| a.is_sentinel()).unwrap_or(false) {
            envelope.note = artifact.and_then(|a| a.notes.first().cloned());
        }
        envelope
    }

    async fn execute_single(
        &self,
        intent_result: IntentResult,
        entities: Vec<Entity>,
        artifact: SqlArtifact,
        backend: crate::domain::Backend,
        request: &Request,
    ) -> Envelope {
        let cache_key = ResultCache::key_for(&backend.id, &artifact.text, &artifact.params);
        let is_select = matches!(artifact.first_verb().as_str(), "SELECT" | "WITH");

        let result = if is_select {
            if let Some(cached) = self.result_cache.get(&cache_key) {
                Some(Ok(cached))
            } else {
                let fetched = self
                    .executor
                    .execute(&backend.id, &artifact, EXECUTE_DEADLINE, DEFAULT_MAX_ROWS)
                    .await;
                if let Ok(ref rs) = fetched {
                    self.result_cache.put(cache_key, rs.clone());
                }
                Some(fetched)
            }
        } else {
            Some(self.executor.execute(&backend.id, &artifact, EXECUTE_DEADLINE, DEFAULT_MAX_ROWS).await)
        };

        match result {
            Some(Ok(result_set)) => {
                let visualization = crate::viz::choose_chart(&result_set, Some(&request.utterance));
                let mut envelope = Envelope::success();
                envelope.sql = Some(artifact.text.clone());
                envelope.parameters = Some(artifact.params.clone());
                envelope.intent = Some(IntentEnvelope { name: intent_result.intent, confidence: intent_result.confidence });
                envelope.entities = entities;
                envelope.result = Some(result_set);
                envelope.visualization = Some(visualization);
                if artifact.is_sentinel() {
                    envelope.note = artifact.notes.first().cloned();
                }
                envelope
            }
            Some(Err(e)) => {
                let mut envelope = Envelope::error("ExecutionError", e.to_string());
                envelope.sql = Some(artifact.text.clone());
                envelope.intent = Some(IntentEnvelope { name: intent_result.intent, confidence: intent_result.confidence });
                envelope.entities = entities;
                envelope
            }
            None => Envelope::error("ExecutionError", "no execution attempted"),
        }
    }

    async fn execute_fanout(
        &self,
        intent_result: IntentResult,
        entities: Vec<Entity>,
        artifact: SqlArtifact,
        backend_ids: &[String],
    ) -> Envelope {
        let is_select = matches!(artifact.first_verb().as_str(), "SELECT" | "WITH");
        let eligible: Vec<String> = backend_ids
            .iter()
            .filter(|id| {
                if is_select {
                    return true;
                }
                self.registry.get(id).map(|b| !b.read_only).unwrap_or(false)
            })
            .cloned()
            .collect();

        let results = self.executor.fan_out(&eligible, &artifact, EXECUTE_DEADLINE).await;

        let mut fanout_results = HashMap::new();
        for (backend_id, outcome) in results {
            match outcome {
                Ok(rs) => {
                    fanout_results.insert(backend_id, FanoutOutcome::Ok(rs));
                }
                Err(e) => {
                    crate::metrics::METRICS.inc_fanout_failures();
                    fanout_results.insert(backend_id, FanoutOutcome::Error { message: e.to_string() });
                }
            }
        }

        let mut envelope = Envelope::success();
        envelope.sql = Some(artifact.text.clone());
        envelope.parameters = Some(artifact.params.clone());
        envelope.intent = Some(IntentEnvelope { name: intent_result.intent, confidence: intent_result.confidence });
        envelope.entities = entities;
        envelope.fanout_results = Some(fanout_results);
        envelope
    }
}
