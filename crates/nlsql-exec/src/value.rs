//! Conversion from a dialect-agnostic `sqlx::any::AnyRow` into the JSON
//! values `nlsql_core::domain::ResultSet` carries.
//!
//! Per §4.8: dates/times serialize to ISO-8601 strings, numerics stay
//! native, NULL is preserved as `Value::Null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};

/// Decode every column of `row` into a JSON value, trying progressively
/// looser types until one decodes cleanly.
pub fn row_to_json_values(row: &AnyRow, column_count: usize) -> Vec<Value> {
    (0..column_count).map(|i| decode_column(row, i)).collect()
}

/// Whether `row`'s column at `index` is declared as a boolean type.
///
/// SQLite has no storage class of its own for booleans — a column declared
/// `BOOLEAN` stores plain 0/1 integers, and `try_get::<Option<i64>, _>`
/// would decode those just as cleanly as a genuine integer column. Probing
/// the declared column type first (rather than just trying `bool` before
/// `i64`) keeps a real integer column — whose value might be anything, not
/// just 0/1 — from being swallowed by a `bool` probe that SQLite's dynamic
/// typing would otherwise let succeed.
fn is_declared_bool(row: &AnyRow, index: usize) -> bool {
    row.column(index).type_info().name().eq_ignore_ascii_case("BOOLEAN")
        || row.column(index).type_info().name().eq_ignore_ascii_case("BOOL")
}

fn decode_column(row: &AnyRow, index: usize) -> Value {
    if is_declared_bool(row, index) {
        if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| Value::from(n)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return v.map(|d| Value::String(d.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return v
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(index) {
        return v.map(|d| Value::String(d.format("%Y-%m-%d").to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}
