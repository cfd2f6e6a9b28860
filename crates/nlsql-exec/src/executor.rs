//! C8 Executor: single-backend and fan-out query execution, plus the
//! `SchemaFetcher` implementation the Schema Cache refreshes through.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlx::Row;

use nlsql_core::domain::{Dialect, ResultSet, SqlArtifact};
use nlsql_core::orchestrator::QueryExecutor;
use nlsql_core::schema_cache::SchemaFetcher;
use nlsql_core::{NlSqlError, Registry, Result as CoreResult};

use crate::dialect::introspect;
use crate::error::ExecutionError;
use crate::pool::PoolManager;
use crate::value::row_to_json_values;

fn to_core_error(backend_id: &str, e: ExecutionError) -> NlSqlError {
    NlSqlError::ExecutionError(format!("{backend_id}: {e}"))
}

/// Executor-side backstop for invariant 4 ("no non-SELECT SQL is ever sent to
/// a read-only Backend"). The Safety Gate (C7) already rejects this upstream;
/// this is a second, independent check parsed with `sqlparser` rather than
/// the gate's regex scan, so a gate bug can't silently reach the database.
fn assert_read_only_compliant(sql: &str, read_only: bool) -> Result<(), ExecutionError> {
    if !read_only {
        return Ok(());
    }
    let statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| ExecutionError::Syntax(e.to_string()))?;
    for statement in &statements {
        if !matches!(statement, Statement::Query(_)) {
            return Err(ExecutionError::Permission(format!(
                "read-only backend rejects non-SELECT statement: {statement}"
            )));
        }
    }
    Ok(())
}

pub struct SqlExecutor {
    registry: Registry,
    pools: PoolManager,
    max_retries: u32,
}

impl SqlExecutor {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            pools: PoolManager::default(),
            max_retries: 3,
        }
    }

    async fn run_once(
        &self,
        backend_id: &str,
        connection_descriptor: &str,
        dialect: Dialect,
        artifact: &SqlArtifact,
        max_rows: usize,
    ) -> Result<ResultSet, ExecutionError> {
        let pool = self.pools.get_or_connect(backend_id, connection_descriptor).await?;

        let (positional_sql, placeholder_order) = rewrite_placeholders(&artifact.text, dialect);
        let empty_params = serde_json::Map::new();
        let params = artifact.params.as_object().unwrap_or(&empty_params);

        let mut query = sqlx::query(&positional_sql);
        for name in &placeholder_order {
            let value = params.get(name).ok_or_else(|| {
                ExecutionError::Syntax(format!("no parameter value supplied for placeholder :{name}"))
            })?;
            query = bind_json_value(query, value);
        }

        let started = std::time::Instant::now();
        let rows = query
            .fetch_all(pool.as_ref())
            .await
            .map_err(|e| ExecutionError::classify(&e))?;

        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut result_rows: Vec<Vec<serde_json::Value>> = rows
            .iter()
            .map(|row| row_to_json_values(row, columns.len()))
            .collect();

        let mut truncated = false;
        if result_rows.len() > max_rows {
            result_rows.truncate(max_rows);
            truncated = true;
        }

        Ok(ResultSet {
            row_count: result_rows.len(),
            columns,
            rows: result_rows,
            truncated,
            execution_ms: started.elapsed().as_millis() as u64,
            cache_hit: false,
            backend_id: backend_id.to_string(),
        })
    }

    async fn execute_with_retry(
        &self,
        backend_id: &str,
        connection_descriptor: &str,
        dialect: Dialect,
        artifact: &SqlArtifact,
        timeout: Duration,
        max_rows: usize,
    ) -> Result<ResultSet, ExecutionError> {
        let mut attempt = 0u32;
        loop {
            let outcome = tokio::time::timeout(
                timeout,
                self.run_once(backend_id, connection_descriptor, dialect, artifact, max_rows),
            )
            .await;

            let result = match outcome {
                Ok(r) => r,
                Err(_) => Err(ExecutionError::Timeout(timeout.as_millis() as u64)),
            };

            match result {
                Ok(rs) => return Ok(rs),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(200 * attempt as u64);
                    tracing::warn!(backend_id, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying query execution");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Rewrite `:name` named placeholders into the positional form the driver
/// behind `dialect` expects — `sqlx`'s `Any` pool has no named-placeholder
/// support, only positional (`$1`, `$2`, … for Postgres; `?` for MySQL and
/// SQLite). Returns the rewritten SQL plus the parameter name referenced by
/// each positional placeholder, in the order they appear — the order
/// `run_once` must bind values in, since binding by `params`' own (BTreeMap)
/// key order would scramble positions whenever it differs from appearance
/// order.
fn rewrite_placeholders(sql: &str, dialect: Dialect) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut order = Vec::new();
    let mut position = 0usize;
    let mut chars = sql.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != ':' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            out.push(':');
            continue;
        }
        position += 1;
        match dialect {
            Dialect::Postgres => out.push_str(&format!("${position}")),
            _ => out.push('?'),
        }
        order.push(name);
    }

    (out, order)
}

fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    value: &'q serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    match value {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) if n.is_i64() => query.bind(n.as_i64().unwrap()),
        serde_json::Value::Number(n) => query.bind(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

#[async_trait]
impl QueryExecutor for SqlExecutor {
    async fn execute(
        &self,
        backend_id: &str,
        artifact: &SqlArtifact,
        timeout: Duration,
        max_rows: usize,
    ) -> CoreResult<ResultSet> {
        let backend = self.registry.get(backend_id)?;
        if let Err(e) = assert_read_only_compliant(&artifact.text, backend.read_only) {
            return Err(to_core_error(backend_id, e));
        }
        self.execute_with_retry(
            backend_id,
            &backend.connection_descriptor,
            backend.dialect,
            artifact,
            timeout,
            max_rows,
        )
        .await
        .map_err(|e| to_core_error(backend_id, e))
    }

    async fn fan_out(
        &self,
        backend_ids: &[String],
        artifact: &SqlArtifact,
        timeout: Duration,
    ) -> HashMap<String, CoreResult<ResultSet>> {
        let futures = backend_ids.iter().map(|id| async move {
            let result = self.execute(id, artifact, timeout, 1000).await;
            (id.clone(), result)
        });
        futures::future::join_all(futures).await.into_iter().collect()
    }
}

#[async_trait]
impl SchemaFetcher for SqlExecutor {
    async fn fetch_schema(&self, backend_id: &str) -> CoreResult<nlsql_core::domain::SchemaSnapshot> {
        let backend = self.registry.get(backend_id)?;
        let pool = self
            .pools
            .get_or_connect(backend_id, &backend.connection_descriptor)
            .await
            .map_err(|e| to_core_error(backend_id, e))?;

        introspect(pool.as_ref(), backend.dialect, backend_id)
            .await
            .map_err(|e| to_core_error(backend_id, e))
    }
}

// Delegating impls so one `Arc<SqlExecutor>` can be shared as both the
// Orchestrator's executor and the Schema Cache's fetcher, instead of each
// holding its own connection pool for the same backends.

#[async_trait]
impl QueryExecutor for std::sync::Arc<SqlExecutor> {
    async fn execute(
        &self,
        backend_id: &str,
        artifact: &SqlArtifact,
        timeout: Duration,
        max_rows: usize,
    ) -> CoreResult<ResultSet> {
        self.as_ref().execute(backend_id, artifact, timeout, max_rows).await
    }

    async fn fan_out(
        &self,
        backend_ids: &[String],
        artifact: &SqlArtifact,
        timeout: Duration,
    ) -> HashMap<String, CoreResult<ResultSet>> {
        self.as_ref().fan_out(backend_ids, artifact, timeout).await
    }
}

#[async_trait]
impl SchemaFetcher for std::sync::Arc<SqlExecutor> {
    async fn fetch_schema(&self, backend_id: &str) -> CoreResult<nlsql_core::domain::SchemaSnapshot> {
        self.as_ref().fetch_schema(backend_id).await
    }
}
