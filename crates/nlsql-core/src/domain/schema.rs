//! Schema metadata types produced by introspection (C2 Schema Cache, C8's
//! metadata path).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single column in a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    /// `true` when `referenced_table` exists in this snapshot; `false` when
    /// it points outside what was introspected (recorded, not resolved).
    pub referenced_table_external: bool,
}

/// A single table, with its columns, primary key, and foreign keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: BTreeSet<String>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Set when this table was merged in from a cross-backend snapshot
    /// (§4.2): the backend it actually came from.
    pub origin_backend_id: Option<String>,
}

impl Table {
    /// Validate the invariants §3 requires of a Table: column names
    /// unique, every PK column exists.
    pub fn is_well_formed(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(&col.name) {
                return false;
            }
        }
        self.primary_key
            .iter()
            .all(|pk_col| self.columns.iter().any(|c| &c.name == pk_col))
    }
}

/// A point-in-time view of a backend's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub backend_id: String,
    pub tables: Vec<Table>,
    pub fetched_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl SchemaSnapshot {
    pub fn empty(backend_id: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            backend_id: backend_id.into(),
            tables: Vec::new(),
            fetched_at: Utc::now(),
            ttl_secs,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.fetched_at).num_seconds().max(0) as u64;
        age > self.ttl_secs
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Merge several per-backend snapshots into one, tagging each table with
    /// its originating backend (§4.2 `merged()`).
    pub fn merge(snapshots: &[SchemaSnapshot]) -> Vec<Table> {
        let mut merged = Vec::new();
        for snap in snapshots {
            for table in &snap.tables {
                let mut tagged = table.clone();
                tagged.origin_backend_id = Some(snap.backend_id.clone());
                merged.push(tagged);
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table {
            name: "customers".to_string(),
            columns: vec![
                Column {
                    name: "id".to_string(),
                    declared_type: "integer".to_string(),
                    nullable: false,
                    default: None,
                },
                Column {
                    name: "status".to_string(),
                    declared_type: "text".to_string(),
                    nullable: true,
                    default: None,
                },
            ],
            primary_key: BTreeSet::from(["id".to_string()]),
            foreign_keys: vec![],
            origin_backend_id: None,
        }
    }

    #[test]
    fn test_table_well_formed_when_pk_in_columns() {
        assert!(sample_table().is_well_formed());
    }

    #[test]
    fn test_table_not_well_formed_when_pk_column_missing() {
        let mut table = sample_table();
        table.primary_key.insert("missing_col".to_string());
        assert!(!table.is_well_formed());
    }

    #[test]
    fn test_table_not_well_formed_on_duplicate_column_names() {
        let mut table = sample_table();
        table.columns.push(Column {
            name: "id".to_string(),
            declared_type: "integer".to_string(),
            nullable: false,
            default: None,
        });
        assert!(!table.is_well_formed());
    }

    #[test]
    fn test_snapshot_staleness() {
        let mut snap = SchemaSnapshot::empty("default", 3600);
        assert!(!snap.is_stale(Utc::now()));
        snap.fetched_at = Utc::now() - chrono::Duration::seconds(3700);
        assert!(snap.is_stale(Utc::now()));
    }

    #[test]
    fn test_merge_tags_origin_backend() {
        let mut snap_a = SchemaSnapshot::empty("db_a", 3600);
        snap_a.tables.push(sample_table());
        let snap_b = SchemaSnapshot::empty("db_b", 3600);

        let merged = SchemaSnapshot::merge(&[snap_a, snap_b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].origin_backend_id.as_deref(), Some("db_a"));
    }

    #[test]
    fn test_find_table_case_insensitive() {
        let mut snap = SchemaSnapshot::empty("default", 3600);
        snap.tables.push(sample_table());
        assert!(snap.find_table("Customers").is_some());
        assert!(snap.find_table("orders").is_none());
    }
}
