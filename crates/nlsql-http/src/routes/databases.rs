//! `GET /databases`, `GET /databases/{id}/schema`, `GET
//! /databases/merged-schema`, and `POST /databases/extract-all-schemas`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::app::App;
use crate::error::{Result, ServerError};

#[derive(Debug, Serialize)]
pub struct DatabaseSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: String,
    pub readonly: bool,
    pub enabled: bool,
}

pub async fn list_databases_handler(State(app): State<Arc<App>>) -> Json<serde_json::Value> {
    let databases: Vec<DatabaseSummary> = app
        .registry
        .list()
        .into_iter()
        .map(|b| DatabaseSummary {
            id: b.id.clone(),
            name: b.display_name.clone(),
            db_type: b.dialect.to_string(),
            readonly: b.read_only,
            enabled: b.enabled,
        })
        .collect();

    Json(serde_json::json!({ "databases": databases }))
}

pub async fn get_schema_handler(
    State(app): State<Arc<App>>,
    Path(backend_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    app.registry.get(&backend_id).map_err(|e| ServerError::NotFound(e.to_string()))?;

    let snapshot = app
        .orchestrator
        .schema_snapshot(&backend_id)
        .await
        .map_err(|e| ServerError::NotFound(e.to_string()))?;

    Ok(Json(serde_json::json!({ "status": "success", "data": snapshot })))
}

pub async fn merged_schema_handler(State(app): State<Arc<App>>) -> Json<serde_json::Value> {
    let tables = app.orchestrator.merged_schema().await;
    Json(serde_json::json!({ "tables": tables }))
}

/// Consolidates the live schema cache for every enabled backend into the
/// metastore's five metadata tables (§6). Refreshes each backend's
/// snapshot first so the consolidated view isn't stale relative to what
/// callers would see from `GET /databases/{id}/schema`.
pub async fn extract_all_schemas_handler(State(app): State<Arc<App>>) -> Result<Json<serde_json::Value>> {
    let backends: Vec<_> = app.registry.list().into_iter().cloned().collect();
    let mut snapshots = Vec::with_capacity(backends.len());

    for backend in &backends {
        let snapshot = app
            .orchestrator
            .schema_snapshot(&backend.id)
            .await
            .map_err(|e| ServerError::NotFound(e.to_string()))?;
        snapshots.push(snapshot);
    }

    app.metastore
        .consolidate(&backends, &snapshots)
        .await
        .map_err(|e| ServerError::Metastore(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "consolidated": backends.len(),
    })))
}
