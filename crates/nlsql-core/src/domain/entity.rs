//! Entities extracted from an utterance alongside its [`Intent`](super::intent::Intent).
//!
//! Tagged union, following the same `#[serde(tag = "kind")]` convention the
//! pipeline uses for its other discriminated outputs.

use serde::{Deserialize, Serialize};

/// A comparison operator usable in a [`Entity::Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
}

/// A supported aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One entity mention extracted from the user's utterance. Stages downstream
/// (the SQL Synthesizer, the Visualization Chooser) consume these as hints,
/// not binding instructions — a synthesizer is free to ignore an entity that
/// doesn't resolve against the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Table {
        name: String,
    },
    Column {
        name: String,
        table_hint: Option<String>,
    },
    Filter {
        column: String,
        op: FilterOp,
        value: serde_json::Value,
    },
    Aggregation {
        function: AggregationFn,
        column: Option<String>,
    },
    TimeRange {
        column: Option<String>,
        start: Option<String>,
        end: Option<String>,
    },
}

impl Entity {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entity::Table { .. } => "table",
            Entity::Column { .. } => "column",
            Entity::Filter { .. } => "filter",
            Entity::Aggregation { .. } => "aggregation",
            Entity::TimeRange { .. } => "time_range",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_tag_round_trips() {
        let e = Entity::Filter {
            column: "status".to_string(),
            op: FilterOp::Eq,
            value: serde_json::json!("active"),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "filter");
        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_kind_name_matches_variant() {
        assert_eq!(Entity::Table { name: "orders".into() }.kind_name(), "table");
        assert_eq!(
            Entity::Aggregation { function: AggregationFn::Sum, column: None }.kind_name(),
            "aggregation"
        );
    }
}
