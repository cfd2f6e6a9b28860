//! Domain-level error taxonomy for the query pipeline.

/// Errors raised by nlsql-core's components.
///
/// Every stage of the pipeline (§7) maps onto one of these
/// variants before the Orchestrator folds it into the response envelope.
#[derive(Debug, thiserror::Error)]
pub enum NlSqlError {
    #[error("backend not found: {0}")]
    BackendNotFound(String),

    #[error("backend id already registered: {0}")]
    DuplicateBackend(String),

    #[error("schema introspection failed for {backend_id}: {reason}")]
    SchemaError { backend_id: String, reason: String },

    #[error("sql generation failed: {0}")]
    SqlGenerationError(String),

    #[error("safety gate rejected the query: {0}")]
    SafetyRejection(String),

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("upstream LLM error: {0}")]
    UpstreamError(String),

    #[error("request deadline exceeded during {stage}")]
    Timeout { stage: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for nlsql-core operations.
pub type Result<T> = std::result::Result<T, NlSqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_not_found_display() {
        let err = NlSqlError::BackendNotFound("db_missing".to_string());
        assert!(err.to_string().contains("db_missing"));
    }

    #[test]
    fn test_timeout_display_names_stage() {
        let err = NlSqlError::Timeout {
            stage: "SYNTHESIZE".to_string(),
        };
        assert!(err.to_string().contains("SYNTHESIZE"));
    }
}
