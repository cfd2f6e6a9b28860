//! nlsql-metastore: the consolidated, out-of-band metadata store described
//! in §6 — five SurrealDB tables (`database_metadata`,
//! `table_metadata`, `column_metadata`, `primary_key_metadata`,
//! `foreign_key_metadata`) written when a caller invokes
//! `POST /databases/extract-all-schemas`.
//!
//! This is deliberately a side view, not the request-time source of
//! truth: `nlsql_core::SchemaCache` stays authoritative for everything the
//! Orchestrator does per-request.

mod error;
mod handle;
mod records;

pub use error::{MetastoreError, Result};
pub use handle::MetastoreHandle;
pub use records::{
    ColumnMetadataRecord, DatabaseMetadataRecord, ForeignKeyMetadataRecord, PrimaryKeyMetadataRecord,
    TableMetadataRecord,
};
