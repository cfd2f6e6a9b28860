//! C5 Intent & Entity Extractor.

use nlsql_llm::{repair_and_parse, CompletionRequest, LlmGateway, ProviderError};

use crate::domain::{AggregationFn, Entity, FilterOp, Intent};

/// Classified intent with the extractor's confidence in that
/// classification. Always produced, even on LLM failure (§4.5 — the
/// keyword fallback never returns an error).
#[derive(Debug, Clone, PartialEq)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    pub description: String,
}

/// Ordered keyword groups for the deterministic fallback classifier.
/// Order matters: the first group whose any keyword appears in the
/// lowercased utterance wins, mirroring an ordered if/elif chain.
const KEYWORD_GROUPS: &[(Intent, &[&str])] = &[
    (Intent::SchemaInfo, &["schema", "what tables", "what columns", "describe table", "structure of"]),
    (Intent::DataVisualization, &["chart", "graph", "plot", "visualize", "visualise"]),
    (Intent::TrendAnalysis, &["trend", "over time", "growth", "month over month", "year over year"]),
    (Intent::Correlation, &["correlate", "correlation", "relationship between", "related to"]),
    (Intent::Comparison, &["compare", "versus", "vs", "difference between"]),
    (Intent::SummarizeData, &["summarize", "summary", "how many", "total", "average", "count of"]),
];

/// Deterministic keyword classifier, used when the LLM Gateway is
/// unavailable or returns an invalid/unparseable response.
pub fn classify_by_keywords(utterance: &str) -> IntentResult {
    let lower = utterance.to_lowercase();
    for (intent, keywords) in KEYWORD_GROUPS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return IntentResult {
                intent: *intent,
                confidence: 0.6,
                description: format!("matched keyword group for {intent}"),
            };
        }
    }
    IntentResult {
        intent: Intent::QueryData,
        confidence: 0.6,
        description: "no keyword group matched; defaulted to QUERY_DATA".to_string(),
    }
}

/// Classify `utterance` via the LLM Gateway in structured-JSON mode,
/// falling back to [`classify_by_keywords`] on any provider failure or
/// malformed response. This function itself never returns an error — it's
/// the concrete embodiment of §7's "IntentError recovered as
/// QUERY_DATA" rule, generalized to any keyword-matchable intent.
pub async fn classify_intent(gateway: &LlmGateway, utterance: &str, schema_context: &str) -> IntentResult {
    if gateway.is_empty() {
        return classify_by_keywords(utterance);
    }

    let system = "You are an intent classifier for a natural-language-to-SQL system. \
        Respond with a single JSON object: {\"intent\": one of QUERY_DATA, SUMMARIZE_DATA, \
        SCHEMA_INFO, DATA_VISUALIZATION, COMPARISON, TREND_ANALYSIS, CORRELATION, \
        \"confidence\": 0.0-1.0, \"description\": short string}. No other text.";
    let user = format!("Schema:\n{schema_context}\n\nUtterance: {utterance}");
    let request = CompletionRequest::new(system, user);

    match gateway.complete(&request).await {
        Ok(response) => match parse_intent_response(&response.text) {
            Some(result) => result,
            None => classify_by_keywords(utterance),
        },
        Err(ProviderError::Invalid(_) | ProviderError::Unavailable(_)) => classify_by_keywords(utterance),
        Err(_) => classify_by_keywords(utterance),
    }
}

fn parse_intent_response(text: &str) -> Option<IntentResult> {
    let value = repair_and_parse(text).ok()?;
    let intent_str = value.get("intent")?.as_str()?;
    let intent = parse_intent_name(intent_str)?;
    let confidence = value.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5) as f32;
    let description = value
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    Some(IntentResult { intent, confidence, description })
}

fn parse_intent_name(name: &str) -> Option<Intent> {
    Intent::ALL.iter().copied().find(|i| i.as_str().eq_ignore_ascii_case(name))
}

/// Extract entities from `utterance` via the LLM Gateway. Per §4.5, any
/// failure here produces an empty sequence rather than an error.
pub async fn extract_entities(gateway: &LlmGateway, utterance: &str, schema_context: &str) -> Vec<Entity> {
    if gateway.is_empty() {
        return Vec::new();
    }

    let system = "Extract entities from the utterance as a JSON object: \
        {\"entities\": [ {\"kind\": \"table\"|\"column\"|\"filter\"|\"aggregation\"|\"time_range\", ...fields} ]}. \
        Use only table/column names that plausibly exist in the provided schema. Respond with JSON only.";
    let user = format!("Schema:\n{schema_context}\n\nUtterance: {utterance}");
    let request = CompletionRequest::new(system, user);

    let Ok(response) = gateway.complete(&request).await else {
        return Vec::new();
    };
    let Ok(value) = repair_and_parse(&response.text) else {
        return Vec::new();
    };
    let Some(entries) = value.get("entities").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    entries.iter().filter_map(parse_entity).collect()
}

fn parse_entity(value: &serde_json::Value) -> Option<Entity> {
    let kind = value.get("kind")?.as_str()?;
    match kind {
        "table" => Some(Entity::Table { name: value.get("name")?.as_str()?.to_string() }),
        "column" => Some(Entity::Column {
            name: value.get("name")?.as_str()?.to_string(),
            table_hint: value.get("table_hint").and_then(|v| v.as_str()).map(str::to_string),
        }),
        "filter" => Some(Entity::Filter {
            column: value.get("column")?.as_str()?.to_string(),
            op: parse_filter_op(value.get("op")?.as_str()?)?,
            value: value.get("value").cloned().unwrap_or(serde_json::Value::Null),
        }),
        "aggregation" => Some(Entity::Aggregation {
            function: parse_aggregation_fn(value.get("function")?.as_str()?)?,
            column: value.get("column").and_then(|v| v.as_str()).map(str::to_string),
        }),
        "time_range" => Some(Entity::TimeRange {
            column: value.get("column").and_then(|v| v.as_str()).map(str::to_string),
            start: value.get("start").and_then(|v| v.as_str()).map(str::to_string),
            end: value.get("end").and_then(|v| v.as_str()).map(str::to_string),
        }),
        _ => None,
    }
}

fn parse_filter_op(s: &str) -> Option<FilterOp> {
    Some(match s {
        "eq" => FilterOp::Eq,
        "neq" => FilterOp::Neq,
        "gt" => FilterOp::Gt,
        "gte" => FilterOp::Gte,
        "lt" => FilterOp::Lt,
        "lte" => FilterOp::Lte,
        "like" => FilterOp::Like,
        "in" => FilterOp::In,
        _ => return None,
    })
}

fn parse_aggregation_fn(s: &str) -> Option<AggregationFn> {
    Some(match s {
        "count" => AggregationFn::Count,
        "sum" => AggregationFn::Sum,
        "avg" => AggregationFn::Avg,
        "min" => AggregationFn::Min,
        "max" => AggregationFn::Max,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_classifier_matches_schema_info() {
        let result = classify_by_keywords("what tables do you have?");
        assert_eq!(result.intent, Intent::SchemaInfo);
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn test_keyword_classifier_defaults_to_query_data() {
        let result = classify_by_keywords("show me the customers");
        assert_eq!(result.intent, Intent::QueryData);
    }

    #[test]
    fn test_keyword_classifier_never_returns_outside_closed_set() {
        for utterance in [
            "compare sales vs profit",
            "trend over time for revenue",
            "correlation between age and income",
            "chart of monthly sales",
            "summarize the orders",
            "random gibberish query",
        ] {
            let result = classify_by_keywords(utterance);
            assert!(Intent::ALL.contains(&result.intent));
        }
    }

    #[tokio::test]
    async fn test_classify_intent_falls_back_when_gateway_empty() {
        let gateway = LlmGateway::new(vec![]);
        let result = classify_intent(&gateway, "what tables exist", "").await;
        assert_eq!(result.intent, Intent::SchemaInfo);
    }

    #[tokio::test]
    async fn test_extract_entities_empty_when_gateway_empty() {
        let gateway = LlmGateway::new(vec![]);
        let entities = extract_entities(&gateway, "show active customers", "").await;
        assert!(entities.is_empty());
    }

    #[test]
    fn test_parse_entity_filter() {
        let raw = serde_json::json!({"kind": "filter", "column": "status", "op": "eq", "value": "active"});
        let entity = parse_entity(&raw).unwrap();
        assert_eq!(entity.kind_name(), "filter");
    }
}
