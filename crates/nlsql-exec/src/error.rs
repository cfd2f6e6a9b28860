//! Executor-specific error taxonomy (§7, §4.8). Classified so the
//! orchestrator and callers know exactly what went wrong and whether a retry
//! makes sense.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("sql syntax error: {0}")]
    Syntax(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("statement timed out after {0}ms")]
    Timeout(u64),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("executor error: {0}")]
    Other(String),
}

impl ExecutionError {
    /// Only `Connection` and `Timeout` are retried automatically (§4.8);
    /// mutations are never retried blind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionError::Connection(_) | ExecutionError::Timeout(_))
    }

    /// Best-effort classification of a `sqlx::Error` into this taxonomy.
    pub fn classify(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ExecutionError::NotFound("no matching row".to_string()),
            sqlx::Error::PoolTimedOut => ExecutionError::Timeout(30_000),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed => ExecutionError::Connection(err.to_string()),
            sqlx::Error::Database(db_err) => classify_database_error(db_err.as_ref()),
            other => ExecutionError::Other(other.to_string()),
        }
    }
}

fn classify_database_error(db_err: &dyn sqlx::error::DatabaseError) -> ExecutionError {
    let message = db_err.message().to_string();
    match db_err.code().as_deref() {
        Some("23505") => ExecutionError::UniqueViolation(message),
        Some("23503") => ExecutionError::ForeignKeyViolation(message),
        Some("42601") => ExecutionError::Syntax(message),
        Some("42501") => ExecutionError::Permission(message),
        _ if db_err.is_unique_violation() => ExecutionError::UniqueViolation(message),
        _ if db_err.is_foreign_key_violation() => ExecutionError::ForeignKeyViolation(message),
        _ => ExecutionError::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_and_timeout_are_retryable() {
        assert!(ExecutionError::Connection("x".to_string()).is_retryable());
        assert!(ExecutionError::Timeout(1).is_retryable());
    }

    #[test]
    fn test_syntax_and_permission_are_not_retryable() {
        assert!(!ExecutionError::Syntax("x".to_string()).is_retryable());
        assert!(!ExecutionError::Permission("x".to_string()).is_retryable());
    }
}
