//! `POST /query` — the single entry point into the Orchestrator.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use nlsql_core::{Mode, Request};

use crate::app::App;
use crate::error::{Result, ServerError};

#[derive(Debug, Deserialize)]
pub struct QueryRequestBody {
    pub utterance: String,
    pub backend_id: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

pub async fn query_handler(
    State(app): State<Arc<App>>,
    Json(body): Json<QueryRequestBody>,
) -> Result<Json<serde_json::Value>> {
    let request = Request::new(body.utterance, body.backend_id, body.mode.unwrap_or_default())
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

    let envelope = app.orchestrator.handle(request).await;
    Ok(Json(serde_json::to_value(envelope).unwrap_or(serde_json::json!({
        "status": "error",
        "errors": [{"kind": "Serialization", "message": "failed to serialize envelope"}],
    }))))
}
