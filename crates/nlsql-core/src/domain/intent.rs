//! The closed set of intents the Intent & Entity Extractor (C5) may assign
//! to an incoming utterance.

use serde::{Deserialize, Serialize};

/// A classified query intent. Closed set — an LLM or keyword classifier
/// producing anything outside these values is a bug in that stage, not a
/// new variant to add here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    QueryData,
    SummarizeData,
    SchemaInfo,
    DataVisualization,
    Comparison,
    TrendAnalysis,
    Correlation,
}

impl Intent {
    /// All closed-set variants, in the order the keyword fallback
    /// classifier checks them.
    pub const ALL: [Intent; 7] = [
        Intent::SchemaInfo,
        Intent::DataVisualization,
        Intent::TrendAnalysis,
        Intent::Correlation,
        Intent::Comparison,
        Intent::SummarizeData,
        Intent::QueryData,
    ];

    /// Whether this intent implies a chart should be produced downstream
    /// even if the utterance didn't explicitly ask for one.
    pub fn implies_visualization(self) -> bool {
        matches!(
            self,
            Intent::DataVisualization | Intent::TrendAnalysis | Intent::Correlation
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::QueryData => "QUERY_DATA",
            Intent::SummarizeData => "SUMMARIZE_DATA",
            Intent::SchemaInfo => "SCHEMA_INFO",
            Intent::DataVisualization => "DATA_VISUALIZATION",
            Intent::Comparison => "COMPARISON",
            Intent::TrendAnalysis => "TREND_ANALYSIS",
            Intent::Correlation => "CORRELATION",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
