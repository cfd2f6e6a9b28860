//! `MetastoreHandle`: connection and CRUD against the five consolidated
//! metadata tables, plus reconstruction of a merged schema view from them.

use std::collections::BTreeMap;

use nlsql_core::domain::{Backend, Column, ForeignKey, SchemaSnapshot, Table};
use surrealdb::engine::local::{Db, Mem};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::{MetastoreError, Result};
use crate::records::{
    ColumnMetadataRecord, DatabaseMetadataRecord, ForeignKeyMetadataRecord, PrimaryKeyMetadataRecord,
    TableMetadataRecord,
};

/// Connection handle for the consolidated schema metadata store.
///
/// This is an out-of-band catalogue, written only when
/// `POST /databases/extract-all-schemas` is invoked; the live Schema
/// Cache (`nlsql_core::SchemaCache`) stays authoritative for request-time
/// schema lookups.
pub struct MetastoreHandle {
    db: Surreal<Db>,
}

impl MetastoreHandle {
    /// Connect to an in-memory SurrealDB instance and ensure the schema
    /// tables exist.
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("connecting to nlsql metastore (in-memory SurrealDB)");

        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| MetastoreError::Connection(e.to_string()))?;

        db.use_ns("nlsql")
            .use_db("metastore")
            .await
            .map_err(|e| MetastoreError::Connection(e.to_string()))?;

        let handle = Self { db };
        handle.init_schema().await?;
        Ok(handle)
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("initializing consolidated metadata schema");

        let schema = r#"
            DEFINE TABLE database_metadata SCHEMAFULL;
            DEFINE FIELD db_id ON database_metadata TYPE string;
            DEFINE FIELD db_name ON database_metadata TYPE string;
            DEFINE FIELD db_type ON database_metadata TYPE string;
            DEFINE FIELD created_at ON database_metadata TYPE datetime;
            DEFINE FIELD updated_at ON database_metadata TYPE datetime;
            DEFINE INDEX idx_database_metadata_db_id ON database_metadata FIELDS db_id UNIQUE;

            DEFINE TABLE table_metadata SCHEMAFULL;
            DEFINE FIELD db_id ON table_metadata TYPE string;
            DEFINE FIELD table_name ON table_metadata TYPE string;
            DEFINE FIELD created_at ON table_metadata TYPE datetime;
            DEFINE INDEX idx_table_metadata_unique ON table_metadata FIELDS db_id, table_name UNIQUE;

            DEFINE TABLE column_metadata SCHEMAFULL;
            DEFINE FIELD db_id ON column_metadata TYPE string;
            DEFINE FIELD table_name ON column_metadata TYPE string;
            DEFINE FIELD column_name ON column_metadata TYPE string;
            DEFINE FIELD data_type ON column_metadata TYPE string;
            DEFINE FIELD is_nullable ON column_metadata TYPE bool;
            DEFINE FIELD column_default ON column_metadata TYPE option<string>;
            DEFINE INDEX idx_column_metadata_unique ON column_metadata FIELDS db_id, table_name, column_name UNIQUE;

            DEFINE TABLE primary_key_metadata SCHEMAFULL;
            DEFINE FIELD db_id ON primary_key_metadata TYPE string;
            DEFINE FIELD table_name ON primary_key_metadata TYPE string;
            DEFINE FIELD column_name ON primary_key_metadata TYPE string;
            DEFINE INDEX idx_pk_metadata_unique ON primary_key_metadata FIELDS db_id, table_name, column_name UNIQUE;

            DEFINE TABLE foreign_key_metadata SCHEMAFULL;
            DEFINE FIELD db_id ON foreign_key_metadata TYPE string;
            DEFINE FIELD table_name ON foreign_key_metadata TYPE string;
            DEFINE FIELD column_name ON foreign_key_metadata TYPE string;
            DEFINE FIELD referenced_table ON foreign_key_metadata TYPE string;
            DEFINE FIELD referenced_column ON foreign_key_metadata TYPE string;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| MetastoreError::SchemaSetup(e.to_string()))?;

        debug!("consolidated metadata schema initialized");
        Ok(())
    }

    /// Consolidate every backend's current snapshot into the five tables,
    /// replacing any rows previously written for that `db_id`.
    ///
    /// Backed by `POST /databases/extract-all-schemas` in the HTTP surface.
    #[instrument(skip(self, backends, snapshots))]
    pub async fn consolidate(&self, backends: &[Backend], snapshots: &[SchemaSnapshot]) -> Result<()> {
        for snapshot in snapshots {
            self.clear_backend(&snapshot.backend_id).await?;

            let db_type = backends
                .iter()
                .find(|b| b.id == snapshot.backend_id)
                .map(|b| format!("{:?}", b.dialect).to_lowercase())
                .unwrap_or_else(|| "unknown".to_string());
            let db_name = backends
                .iter()
                .find(|b| b.id == snapshot.backend_id)
                .map(|b| b.display_name.clone())
                .unwrap_or_else(|| snapshot.backend_id.clone());

            let db_record = DatabaseMetadataRecord::new(snapshot.backend_id.clone(), db_name, db_type);
            let _created: Option<DatabaseMetadataRecord> =
                self.db.create("database_metadata").content(db_record).await?;

            for table in &snapshot.tables {
                self.write_table(&snapshot.backend_id, table).await?;
            }
        }

        info!(backends = snapshots.len(), "consolidated schema metadata");
        Ok(())
    }

    async fn write_table(&self, db_id: &str, table: &Table) -> Result<()> {
        let table_record = TableMetadataRecord::new(db_id.to_string(), table.name.clone());
        let _created: Option<TableMetadataRecord> = self.db.create("table_metadata").content(table_record).await?;

        for column in &table.columns {
            let record = ColumnMetadataRecord {
                id: None,
                db_id: db_id.to_string(),
                table_name: table.name.clone(),
                column_name: column.name.clone(),
                data_type: column.declared_type.clone(),
                is_nullable: column.nullable,
                column_default: column.default.clone(),
            };
            let _created: Option<ColumnMetadataRecord> =
                self.db.create("column_metadata").content(record).await?;
        }

        for pk_column in &table.primary_key {
            let record = PrimaryKeyMetadataRecord {
                id: None,
                db_id: db_id.to_string(),
                table_name: table.name.clone(),
                column_name: pk_column.clone(),
            };
            let _created: Option<PrimaryKeyMetadataRecord> =
                self.db.create("primary_key_metadata").content(record).await?;
        }

        for fk in &table.foreign_keys {
            for (column, referenced_column) in fk.columns.iter().zip(fk.referenced_columns.iter()) {
                let record = ForeignKeyMetadataRecord {
                    id: None,
                    db_id: db_id.to_string(),
                    table_name: table.name.clone(),
                    column_name: column.clone(),
                    referenced_table: fk.referenced_table.clone(),
                    referenced_column: referenced_column.clone(),
                };
                let _created: Option<ForeignKeyMetadataRecord> =
                    self.db.create("foreign_key_metadata").content(record).await?;
            }
        }

        Ok(())
    }

    /// Remove every row previously written for `db_id`, across all five
    /// tables, before re-consolidating it.
    async fn clear_backend(&self, db_id: &str) -> Result<()> {
        let id = db_id.to_string();
        for table in [
            "database_metadata",
            "table_metadata",
            "column_metadata",
            "primary_key_metadata",
            "foreign_key_metadata",
        ] {
            self.db
                .query(format!("DELETE FROM {table} WHERE db_id = $id"))
                .bind(("id", id.clone()))
                .await?;
        }
        Ok(())
    }

    /// Reconstruct a merged schema view from the persisted tables (`GET
    /// /databases/merged-schema`). Independent of the live Schema Cache —
    /// reflects whatever was last consolidated.
    #[instrument(skip(self))]
    pub async fn merged_schema(&self) -> Result<Vec<SchemaSnapshot>> {
        let mut databases: Vec<DatabaseMetadataRecord> =
            self.db.query("SELECT * FROM database_metadata").await?.take(0)?;
        databases.sort_by(|a, b| a.db_id.cmp(&b.db_id));

        let tables: Vec<TableMetadataRecord> = self.db.query("SELECT * FROM table_metadata").await?.take(0)?;
        let columns: Vec<ColumnMetadataRecord> = self.db.query("SELECT * FROM column_metadata").await?.take(0)?;
        let pks: Vec<PrimaryKeyMetadataRecord> =
            self.db.query("SELECT * FROM primary_key_metadata").await?.take(0)?;
        let fks: Vec<ForeignKeyMetadataRecord> =
            self.db.query("SELECT * FROM foreign_key_metadata").await?.take(0)?;

        let mut snapshots = Vec::with_capacity(databases.len());
        for db_record in &databases {
            let mut table_map: BTreeMap<String, Table> = BTreeMap::new();

            for t in tables.iter().filter(|t| t.db_id == db_record.db_id) {
                table_map.entry(t.table_name.clone()).or_insert_with(|| Table {
                    name: t.table_name.clone(),
                    columns: Vec::new(),
                    primary_key: Default::default(),
                    foreign_keys: Vec::new(),
                    origin_backend_id: Some(db_record.db_id.clone()),
                });
            }

            for c in columns.iter().filter(|c| c.db_id == db_record.db_id) {
                if let Some(table) = table_map.get_mut(&c.table_name) {
                    table.columns.push(Column {
                        name: c.column_name.clone(),
                        declared_type: c.data_type.clone(),
                        nullable: c.is_nullable,
                        default: c.column_default.clone(),
                    });
                }
            }

            for pk in pks.iter().filter(|pk| pk.db_id == db_record.db_id) {
                if let Some(table) = table_map.get_mut(&pk.table_name) {
                    table.primary_key.insert(pk.column_name.clone());
                }
            }

            for fk in fks.iter().filter(|fk| fk.db_id == db_record.db_id) {
                if let Some(table) = table_map.get_mut(&fk.table_name) {
                    if let Some(existing) = table
                        .foreign_keys
                        .iter_mut()
                        .find(|e| e.referenced_table == fk.referenced_table)
                    {
                        existing.columns.push(fk.column_name.clone());
                        existing.referenced_columns.push(fk.referenced_column.clone());
                    } else {
                        table.foreign_keys.push(ForeignKey {
                            columns: vec![fk.column_name.clone()],
                            referenced_table: fk.referenced_table.clone(),
                            referenced_columns: vec![fk.referenced_column.clone()],
                            referenced_table_external: !table_map.contains_key(&fk.referenced_table),
                        });
                    }
                }
            }

            let mut snapshot = SchemaSnapshot::empty(db_record.db_id.clone(), 3600);
            snapshot.tables = table_map.into_values().collect();
            snapshots.push(snapshot);
        }

        Ok(snapshots)
    }

    /// List the `db_id`s currently consolidated into the metastore.
    pub async fn list_database_ids(&self) -> Result<Vec<String>> {
        let databases: Vec<DatabaseMetadataRecord> =
            self.db.query("SELECT * FROM database_metadata").await?.take(0)?;
        Ok(databases.into_iter().map(|d| d.db_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlsql_core::domain::{Backend, Dialect};
    use std::collections::BTreeSet;

    fn sample_backend() -> Backend {
        Backend {
            id: "default".to_string(),
            display_name: "Default Database".to_string(),
            dialect: Dialect::Postgres,
            connection_descriptor: "postgresql://localhost/app".to_string(),
            enabled: true,
            read_only: false,
        }
    }

    fn sample_snapshot() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::empty("default", 3600);
        snapshot.tables.push(Table {
            name: "customers".to_string(),
            columns: vec![
                Column { name: "id".to_string(), declared_type: "integer".to_string(), nullable: false, default: None },
                Column { name: "status".to_string(), declared_type: "text".to_string(), nullable: true, default: None },
            ],
            primary_key: BTreeSet::from(["id".to_string()]),
            foreign_keys: vec![],
            origin_backend_id: None,
        });
        snapshot
    }

    #[tokio::test]
    async fn test_setup_db_creates_schema() {
        let handle = MetastoreHandle::setup_db().await;
        assert!(handle.is_ok());
    }

    #[tokio::test]
    async fn test_consolidate_then_merged_schema_round_trips() {
        let handle = MetastoreHandle::setup_db().await.unwrap();
        handle.consolidate(&[sample_backend()], &[sample_snapshot()]).await.unwrap();

        let merged = handle.merged_schema().await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].backend_id, "default");
        let table = merged[0].find_table("customers").unwrap();
        assert_eq!(table.columns.len(), 2);
        assert!(table.primary_key.contains("id"));
    }

    #[tokio::test]
    async fn test_consolidate_replaces_previous_rows_for_backend() {
        let handle = MetastoreHandle::setup_db().await.unwrap();
        handle.consolidate(&[sample_backend()], &[sample_snapshot()]).await.unwrap();

        let mut empty_snapshot = SchemaSnapshot::empty("default", 3600);
        empty_snapshot.tables.clear();
        handle.consolidate(&[sample_backend()], &[empty_snapshot]).await.unwrap();

        let merged = handle.merged_schema().await.unwrap();
        assert_eq!(merged.len(), 1);
        assert!(merged[0].tables.is_empty());
    }

    #[tokio::test]
    async fn test_list_database_ids() {
        let handle = MetastoreHandle::setup_db().await.unwrap();
        handle.consolidate(&[sample_backend()], &[sample_snapshot()]).await.unwrap();
        let ids = handle.list_database_ids().await.unwrap();
        assert_eq!(ids, vec!["default".to_string()]);
    }
}
