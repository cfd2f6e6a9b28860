//! The chart recommendation produced by the Visualization Chooser (C9).

use serde::{Deserialize, Serialize};

/// The closed set of chart types the Visualization Chooser may recommend
/// (§3), including the `table` fallback and the `value` single-scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Pie,
    Histogram,
    Heatmap,
    Area,
    Box,
    Treemap,
    Sunburst,
    Value,
    Table,
}

/// Which result-set column feeds which visual channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
}

impl Encoding {
    pub fn empty() -> Self {
        Self { x: None, y: None, color: None, size: None }
    }
}

/// The chosen chart. `kind` is always a member of the closed set — there is
/// no "no chart" state; a bare result still gets `table` or `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub encoding: Encoding,
    pub options: serde_json::Value,
    pub reason: String,
    pub confidence: f32,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, encoding: Encoding, confidence: f32, reason: impl Into<String>) -> Self {
        Self { kind, encoding, options: serde_json::json!({}), reason: reason.into(), confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ChartKind::Heatmap).unwrap();
        assert_eq!(json, "\"heatmap\"");
    }

    #[test]
    fn test_value_and_table_kinds_serialize() {
        assert_eq!(serde_json::to_string(&ChartKind::Value).unwrap(), "\"value\"");
        assert_eq!(serde_json::to_string(&ChartKind::Table).unwrap(), "\"table\"");
    }
}
