//! `GET /health` — liveness probe, present the way every service in this
//! stack exposes one.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::app::App;

pub async fn health_handler(State(app): State<Arc<App>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "backends": app.registry.list().len(),
    }))
}
