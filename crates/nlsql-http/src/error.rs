//! Server-level errors — distinct from the Orchestrator's own envelope,
//! which never throws. These cover the HTTP plumbing around it: bind
//! failures and request bodies that don't even parse.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    BindError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database not found: {0}")]
    NotFound(String),

    #[error("metastore error: {0}")]
    Metastore(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            ServerError::BindError(_) | ServerError::Metastore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = json!({ "status": "error", "errors": [{"kind": "ServerError", "message": self.to_string()}] });
        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
