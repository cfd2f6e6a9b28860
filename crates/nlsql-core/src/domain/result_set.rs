//! The tabular result produced by the Executor (C8).

use serde::{Deserialize, Serialize};

/// A backend-agnostic query result.
///
/// `rows` is row-major: each entry is one row, with values ordered to match
/// `columns`. Values are pre-serialized to JSON by the executor's dialect
/// adapter (dates to ISO-8601 strings, numerics kept native, NULL as
/// `Value::Null`) so this type carries no backend-specific representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    /// `true` when the result was cut off at the row cap (§4.8) rather than
    /// the backend genuinely returning no more rows.
    pub truncated: bool,
    pub execution_ms: u64,
    pub cache_hit: bool,
    pub backend_id: String,
}

impl ResultSet {
    pub fn empty(backend_id: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            row_count: 0,
            truncated: false,
            execution_ms: 0,
            cache_hit: false,
            backend_id: backend_id.into(),
        }
    }

    /// Cap `rows` to `limit`, marking `truncated` if anything was dropped.
    pub fn apply_row_cap(&mut self, limit: usize) {
        if self.rows.len() > limit {
            self.rows.truncate(limit);
            self.truncated = true;
        }
        self.row_count = self.rows.len();
    }

    pub fn is_well_formed(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.columns.len()) && self.row_count == self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> ResultSet {
        let mut rs = ResultSet::empty("default", vec!["id".to_string()]);
        rs.rows = (0..n).map(|i| vec![serde_json::json!(i)]).collect();
        rs.row_count = rs.rows.len();
        rs
    }

    #[test]
    fn test_row_cap_truncates_and_flags() {
        let mut rs = sample(500);
        rs.apply_row_cap(100);
        assert_eq!(rs.rows.len(), 100);
        assert!(rs.truncated);
        assert_eq!(rs.row_count, 100);
    }

    #[test]
    fn test_row_cap_noop_when_under_limit() {
        let mut rs = sample(10);
        rs.apply_row_cap(100);
        assert_eq!(rs.rows.len(), 10);
        assert!(!rs.truncated);
    }

    #[test]
    fn test_well_formed_requires_matching_row_widths() {
        let mut rs = sample(3);
        assert!(rs.is_well_formed());
        rs.rows.push(vec![]);
        assert!(!rs.is_well_formed());
    }
}
