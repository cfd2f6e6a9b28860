//! Dialect-specific schema introspection, feeding the Schema Cache's
//! metadata path (§4.8 "Metadata path").

use std::collections::BTreeSet;

use sqlx::{AnyPool, Row};

use nlsql_core::domain::{Column, Dialect, ForeignKey, SchemaSnapshot, Table};

use crate::error::ExecutionError;

/// Introspect `backend_id`'s schema through `pool`, dispatching on dialect.
pub async fn introspect(
    pool: &AnyPool,
    dialect: Dialect,
    backend_id: &str,
) -> Result<SchemaSnapshot, ExecutionError> {
    let tables = match dialect {
        Dialect::Postgres | Dialect::Mysql => introspect_information_schema(pool).await?,
        Dialect::Sqlite => introspect_sqlite(pool).await?,
        _ => Vec::new(),
    };

    let mut snapshot = SchemaSnapshot::empty(backend_id, 3600);
    snapshot.tables = tables;
    Ok(snapshot)
}

async fn introspect_information_schema(pool: &AnyPool) -> Result<Vec<Table>, ExecutionError> {
    let column_rows = sqlx::query(
        "SELECT table_name, column_name, data_type, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE table_schema NOT IN ('information_schema', 'pg_catalog') \
         ORDER BY table_name, ordinal_position",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| ExecutionError::Other(e.to_string()))?;

    let mut tables: Vec<Table> = Vec::new();
    for row in &column_rows {
        let table_name: String = row.try_get("table_name").unwrap_or_default();
        let column_name: String = row.try_get("column_name").unwrap_or_default();
        let data_type: String = row.try_get("data_type").unwrap_or_default();
        let is_nullable: String = row.try_get("is_nullable").unwrap_or_else(|_| "YES".to_string());
        let default: Option<String> = row.try_get("column_default").ok();

        let table = match tables.iter_mut().find(|t| t.name == table_name) {
            Some(t) => t,
            None => {
                tables.push(Table {
                    name: table_name.clone(),
                    columns: Vec::new(),
                    primary_key: BTreeSet::new(),
                    foreign_keys: Vec::new(),
                    origin_backend_id: None,
                });
                tables.last_mut().unwrap()
            }
        };
        table.columns.push(Column {
            name: column_name,
            declared_type: data_type,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            default,
        });
    }

    let pk_rows = sqlx::query(
        "SELECT tc.table_name, kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
         WHERE tc.constraint_type = 'PRIMARY KEY'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| ExecutionError::Other(e.to_string()))?;

    for row in &pk_rows {
        let table_name: String = row.try_get("table_name").unwrap_or_default();
        let column_name: String = row.try_get("column_name").unwrap_or_default();
        if let Some(table) = tables.iter_mut().find(|t| t.name == table_name) {
            table.primary_key.insert(column_name);
        }
    }

    Ok(tables)
}

async fn introspect_sqlite(pool: &AnyPool) -> Result<Vec<Table>, ExecutionError> {
    let table_rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .fetch_all(pool)
        .await
        .map_err(|e| ExecutionError::Other(e.to_string()))?;

    let mut tables = Vec::new();
    for row in &table_rows {
        let name: String = row.try_get("name").unwrap_or_default();
        let mut table = Table {
            name: name.clone(),
            columns: Vec::new(),
            primary_key: BTreeSet::new(),
            foreign_keys: Vec::new(),
            origin_backend_id: None,
        };

        let pragma_query = format!("PRAGMA table_info({name})");
        let col_rows = sqlx::query(&pragma_query)
            .fetch_all(pool)
            .await
            .map_err(|e| ExecutionError::Other(e.to_string()))?;

        for col_row in &col_rows {
            let col_name: String = col_row.try_get("name").unwrap_or_default();
            let col_type: String = col_row.try_get("type").unwrap_or_default();
            let not_null: i64 = col_row.try_get("notnull").unwrap_or(0);
            let is_pk: i64 = col_row.try_get("pk").unwrap_or(0);
            let default: Option<String> = col_row.try_get("dflt_value").ok();

            if is_pk > 0 {
                table.primary_key.insert(col_name.clone());
            }
            table.columns.push(Column {
                name: col_name,
                declared_type: col_type,
                nullable: not_null == 0,
                default,
            });
        }

        let fk_query = format!("PRAGMA foreign_key_list({name})");
        let fk_rows = sqlx::query(&fk_query)
            .fetch_all(pool)
            .await
            .map_err(|e| ExecutionError::Other(e.to_string()))?;
        for fk_row in &fk_rows {
            let referenced_table: String = fk_row.try_get("table").unwrap_or_default();
            let from_col: String = fk_row.try_get("from").unwrap_or_default();
            let to_col: String = fk_row.try_get("to").unwrap_or_default();
            table.foreign_keys.push(ForeignKey {
                columns: vec![from_col],
                referenced_table,
                referenced_columns: vec![to_col],
                referenced_table_external: false,
            });
        }

        tables.push(table);
    }

    Ok(tables)
}
