//! Errors for the consolidated metadata store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetastoreError {
    #[error("metastore connection failed: {0}")]
    Connection(String),

    #[error("metastore query failed: {0}")]
    Query(String),

    #[error("metastore schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for MetastoreError {
    fn from(err: surrealdb::Error) -> Self {
        MetastoreError::Query(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MetastoreError>;
