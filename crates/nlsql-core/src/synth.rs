//! C6 SQL Synthesizer.

use nlsql_llm::{repair_and_parse, strip_code_fences, CompletionRequest, LlmGateway};

use crate::domain::sql_artifact::extract_placeholders;
use crate::domain::{Dialect, Intent, SchemaSnapshot, SqlArtifact, Table};

/// Domain-keyword list used to pick a default table when an utterance names
/// none, ordered by preference (ported from the original query agent's
/// default-table heuristic).
const DEFAULT_TABLE_KEYWORDS: &[&str] = &["users", "customers", "orders", "products", "transactions", "data"];

/// Phrases that mark an utterance as ambiguous enough to need a default
/// table hint in the synthesis prompt.
const AMBIGUOUS_PATTERNS: &[&str] = &["top 5 rows", "show me the data", "show the rows", "show top"];

pub struct SynthesisInput<'a> {
    pub utterance: &'a str,
    pub schema_snapshots: &'a [SchemaSnapshot],
    pub intent: Intent,
    pub dialect: Dialect,
    pub cross_backend: bool,
}

/// Format the schema as a compact tabular prompt fragment. For cross-backend
/// input, each table is prefixed with its owning backend id and a note
/// explains the `backend_id.table` addressing convention.
fn format_schema_prompt(input: &SynthesisInput<'_>) -> String {
    if input.schema_snapshots.iter().all(SchemaSnapshot::is_empty) {
        return "No tables available.".to_string();
    }

    let mut out = String::new();
    if input.cross_backend {
        out.push_str("Cross-backend query: reference tables as backend_id.table_name.\n\n");
    }

    for snapshot in input.schema_snapshots {
        for table in &snapshot.tables {
            if input.cross_backend {
                out.push_str(&format!("{}.{}(", snapshot.backend_id, table.name));
            } else {
                out.push_str(&format!("{}(", table.name));
            }
            let cols: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.declared_type))
                .collect();
            out.push_str(&cols.join(", "));
            out.push(')');
            if !table.primary_key.is_empty() {
                out.push_str(&format!(" PK({})", table.primary_key.iter().cloned().collect::<Vec<_>>().join(",")));
            }
            for fk in &table.foreign_keys {
                out.push_str(&format!(
                    " FK({}->{}.{})",
                    fk.columns.join(","),
                    fk.referenced_table,
                    fk.referenced_columns.join(",")
                ));
            }
            out.push('\n');
        }
    }
    out
}

fn is_ambiguous(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    AMBIGUOUS_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Pick the default table per the domain-keyword heuristic: first table
/// whose name substring-matches a keyword, else the first table overall.
fn pick_default_table(tables: &[&Table]) -> Option<String> {
    for keyword in DEFAULT_TABLE_KEYWORDS {
        if let Some(t) = tables.iter().find(|t| t.name.to_lowercase().contains(keyword)) {
            return Some(t.name.clone());
        }
    }
    tables.first().map(|t| t.name.clone())
}

#[derive(Debug, Clone)]
struct ValidationVerdict {
    is_valid: bool,
    errors: Vec<String>,
}

async fn self_validate(gateway: &LlmGateway, sql: &str, schema_prompt: &str) -> ValidationVerdict {
    if gateway.is_empty() {
        return ValidationVerdict { is_valid: true, errors: vec![] };
    }

    let system = "You validate SQL against a schema. Respond with JSON only: \
        {\"is_valid\": bool, \"confidence\": 0.0-1.0, \"errors\": [string], \"warnings\": [string]}.";
    let user = format!("Schema:\n{schema_prompt}\n\nSQL:\n{sql}");
    let request = CompletionRequest::new(system, user);

    match gateway.complete(&request).await {
        Ok(response) => match repair_and_parse(&response.text) {
            Ok(value) => ValidationVerdict {
                is_valid: value.get("is_valid").and_then(|v| v.as_bool()).unwrap_or(true),
                errors: value
                    .get("errors")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|e| e.as_str().map(str::to_string)).collect())
                    .unwrap_or_default(),
            },
            Err(_) => ValidationVerdict { is_valid: true, errors: vec![] },
        },
        Err(_) => ValidationVerdict { is_valid: true, errors: vec![] },
    }
}

async fn generate_sql(gateway: &LlmGateway, input: &SynthesisInput<'_>, schema_prompt: &str, repair_errors: Option<&[String]>) -> String {
    if gateway.is_empty() {
        return String::new();
    }

    let system = format!(
        "You generate {} SQL. Return only the SQL statement, no placeholders like <table>, \
        prefer explicit column lists over *, and write literal values directly in the query \
        (a separate step parameterizes it afterward).",
        input.dialect
    );
    let mut user = format!(
        "Schema:\n{schema_prompt}\n\nIntent: {}\n\nUtterance: {}",
        input.intent, input.utterance
    );
    if let Some(errors) = repair_errors {
        user.push_str(&format!("\n\nThe previous SQL was invalid for these reasons: {}. Fix it.", errors.join("; ")));
    }

    let request = CompletionRequest::new(system, user);
    match gateway.complete(&request).await {
        Ok(response) => strip_code_fences(&response.text).to_string(),
        Err(_) => String::new(),
    }
}

/// Result of [`parameterize_sql`]: the (possibly rewritten) SQL text paired
/// with the params it now references.
struct Parameterized {
    sql: String,
    params: serde_json::Value,
}

/// Convert a literal-valued SQL statement into a named-placeholder form plus
/// a matching `params` object, via a dedicated structured-JSON call — ported
/// from the original query agent's `_parameterize_sql` step, which runs
/// after generation/validation and returns the input SQL unchanged with
/// empty parameters whenever the call or the parse fails.
async fn parameterize_sql(gateway: &LlmGateway, sql: &str) -> Parameterized {
    let unparameterized = Parameterized { sql: sql.to_string(), params: serde_json::json!({}) };
    if gateway.is_empty() {
        return unparameterized;
    }

    let system = "You extract parameters from a SQL query for safe parameterized execution. \
        Respond with JSON only: {\"parameterized_sql\": string, \"parameters\": object mapping \
        each :name placeholder in parameterized_sql to the literal value it replaced}.";
    let user = format!(
        "Original SQL query:\n{sql}\n\nRewrite any literal values that should be parameters as \
        :name placeholders and return both the rewritten SQL and the parameters object."
    );
    let request = CompletionRequest::new(system, user);

    let Ok(response) = gateway.complete(&request).await else {
        return unparameterized;
    };
    let Ok(value) = repair_and_parse(&response.text) else {
        return unparameterized;
    };

    let parameterized_sql = value.get("parameterized_sql").and_then(|v| v.as_str());
    let parameters = value.get("parameters").and_then(|v| v.as_object());
    let (Some(parameterized_sql), Some(parameters)) = (parameterized_sql, parameters) else {
        return unparameterized;
    };

    let referenced = extract_placeholders(parameterized_sql);
    let declared: std::collections::HashSet<&str> = parameters.keys().map(String::as_str).collect();
    let referenced_set: std::collections::HashSet<&str> = referenced.iter().map(String::as_str).collect();
    if referenced_set != declared {
        return unparameterized;
    }

    Parameterized {
        sql: parameterized_sql.to_string(),
        params: serde_json::Value::Object(parameters.clone()),
    }
}

/// Synthesize an [`SqlArtifact`] for `input`, following §4.6's generate →
/// self-validate → repair-once algorithm, with ambiguity and empty-schema
/// fallbacks.
pub async fn synthesize(gateway: &LlmGateway, input: SynthesisInput<'_>) -> SqlArtifact {
    let all_empty = input.schema_snapshots.iter().all(SchemaSnapshot::is_empty);
    if all_empty {
        return SqlArtifact::sentinel(
            input.dialect,
            "schema is empty; provide a table name to generate a meaningful query",
        );
    }

    let mut schema_prompt = format_schema_prompt(&input);

    if is_ambiguous(input.utterance) {
        let tables: Vec<&Table> = input.schema_snapshots.iter().flat_map(|s| s.tables.iter()).collect();
        if let Some(default_table) = pick_default_table(&tables) {
            schema_prompt.push_str(&format!("\nNote: utterance does not name a table; default to `{default_table}`.\n"));
        }
    }

    let mut sql = generate_sql(gateway, &input, &schema_prompt, None).await;
    if sql.trim().is_empty() {
        return SqlArtifact::sentinel(input.dialect, "SQL generation produced no output");
    }

    let verdict = self_validate(gateway, &sql, &schema_prompt).await;
    let mut notes = Vec::new();
    if !verdict.is_valid {
        let repaired = generate_sql(gateway, &input, &schema_prompt, Some(&verdict.errors)).await;
        if !repaired.trim().is_empty() {
            sql = repaired;
        }
        let reverdict = self_validate(gateway, &sql, &schema_prompt).await;
        if !reverdict.is_valid {
            notes.push(format!(
                "validation still reports issues after one repair attempt: {}",
                reverdict.errors.join("; ")
            ));
        }
    }

    let parameterized = parameterize_sql(gateway, &sql).await;

    SqlArtifact {
        dialect: input.dialect,
        text: parameterized.sql,
        params: parameterized.params,
        confidence: if notes.is_empty() { 0.85 } else { 0.4 },
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ForeignKey};
    use std::collections::BTreeSet;

    fn netflix_snapshot() -> SchemaSnapshot {
        let mut snap = SchemaSnapshot::empty("db_3", 3600);
        snap.tables.push(Table {
            name: "netflix_shows".to_string(),
            columns: vec![
                Column { name: "show_id".to_string(), declared_type: "text".to_string(), nullable: false, default: None },
                Column { name: "title".to_string(), declared_type: "text".to_string(), nullable: true, default: None },
            ],
            primary_key: BTreeSet::from(["show_id".to_string()]),
            foreign_keys: Vec::<ForeignKey>::new(),
            origin_backend_id: None,
        });
        snap
    }

    #[tokio::test]
    async fn test_empty_schema_produces_sentinel() {
        let gateway = LlmGateway::new(vec![]);
        let input = SynthesisInput {
            utterance: "show top 5 rows",
            schema_snapshots: &[SchemaSnapshot::empty("default", 3600)],
            intent: Intent::QueryData,
            dialect: Dialect::Postgres,
            cross_backend: false,
        };
        let artifact = synthesize(&gateway, input).await;
        assert!(artifact.is_sentinel());
        assert!(!artifact.notes.is_empty());
    }

    #[tokio::test]
    async fn test_no_providers_and_nonempty_schema_also_sentinel() {
        let gateway = LlmGateway::new(vec![]);
        let input = SynthesisInput {
            utterance: "list netflix shows",
            schema_snapshots: &[netflix_snapshot()],
            intent: Intent::QueryData,
            dialect: Dialect::Postgres,
            cross_backend: false,
        };
        let artifact = synthesize(&gateway, input).await;
        assert!(artifact.is_sentinel());
    }

    #[test]
    fn test_pick_default_table_prefers_keyword_match() {
        let t1 = Table { name: "widgets".to_string(), columns: vec![], primary_key: BTreeSet::new(), foreign_keys: vec![], origin_backend_id: None };
        let t2 = Table { name: "customers".to_string(), columns: vec![], primary_key: BTreeSet::new(), foreign_keys: vec![], origin_backend_id: None };
        let picked = pick_default_table(&[&t1, &t2]);
        assert_eq!(picked, Some("customers".to_string()));
    }

    #[test]
    fn test_pick_default_table_falls_back_to_first() {
        let t1 = Table { name: "widgets".to_string(), columns: vec![], primary_key: BTreeSet::new(), foreign_keys: vec![], origin_backend_id: None };
        let picked = pick_default_table(&[&t1]);
        assert_eq!(picked, Some("widgets".to_string()));
    }

    #[test]
    fn test_is_ambiguous_detects_known_pattern() {
        assert!(is_ambiguous("show top 5 rows please"));
        assert!(!is_ambiguous("show 5 rows of orders"));
    }

    #[test]
    fn test_format_schema_prompt_cross_backend_prefixes_table() {
        let input = SynthesisInput {
            utterance: "sum of amount across all databases",
            schema_snapshots: &[netflix_snapshot()],
            intent: Intent::QueryData,
            dialect: Dialect::Postgres,
            cross_backend: true,
        };
        let prompt = format_schema_prompt(&input);
        assert!(prompt.contains("db_3.netflix_shows"));
    }

    #[tokio::test]
    async fn test_parameterize_sql_is_noop_with_no_providers() {
        let gateway = LlmGateway::new(vec![]);
        let parameterized = parameterize_sql(&gateway, "SELECT * FROM customers WHERE status = 'active'").await;
        assert_eq!(parameterized.sql, "SELECT * FROM customers WHERE status = 'active'");
        assert_eq!(parameterized.params, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_parameterize_sql_rewrites_literal_into_named_param() {
        use nlsql_llm::fakes::FixedProvider;

        let response = serde_json::json!({
            "parameterized_sql": "SELECT * FROM customers WHERE status = :status",
            "parameters": {"status": "active"},
        })
        .to_string();
        let gateway = LlmGateway::new(vec![Box::new(FixedProvider::new("fixed", response))]);

        let parameterized = parameterize_sql(&gateway, "SELECT * FROM customers WHERE status = 'active'").await;
        assert_eq!(parameterized.sql, "SELECT * FROM customers WHERE status = :status");
        assert_eq!(parameterized.params, serde_json::json!({"status": "active"}));
    }

    #[tokio::test]
    async fn test_parameterize_sql_falls_back_when_placeholders_and_params_disagree() {
        use nlsql_llm::fakes::FixedProvider;

        let response = serde_json::json!({
            "parameterized_sql": "SELECT * FROM customers WHERE status = :status",
            "parameters": {"other": "active"},
        })
        .to_string();
        let gateway = LlmGateway::new(vec![Box::new(FixedProvider::new("fixed", response))]);

        let parameterized = parameterize_sql(&gateway, "SELECT * FROM customers WHERE status = 'active'").await;
        assert_eq!(parameterized.sql, "SELECT * FROM customers WHERE status = 'active'");
        assert_eq!(parameterized.params, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_parameterize_sql_falls_back_on_unparseable_response() {
        use nlsql_llm::fakes::FixedProvider;

        let gateway = LlmGateway::new(vec![Box::new(FixedProvider::new("fixed", "not json at all"))]);
        let parameterized = parameterize_sql(&gateway, "SELECT 1").await;
        assert_eq!(parameterized.sql, "SELECT 1");
        assert_eq!(parameterized.params, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_synthesize_end_to_end_produces_matching_placeholders_and_params() {
        use nlsql_llm::fakes::ScriptedProvider;

        let responses = vec![
            Ok("SELECT * FROM customers WHERE status = 'active'".to_string()),
            Ok(serde_json::json!({"is_valid": true, "confidence": 0.9, "errors": [], "warnings": []}).to_string()),
            Ok(serde_json::json!({
                "parameterized_sql": "SELECT * FROM customers WHERE status = :status",
                "parameters": {"status": "active"},
            })
            .to_string()),
        ];
        let gateway = LlmGateway::new(vec![Box::new(ScriptedProvider::new("scripted", responses))]);

        let input = SynthesisInput {
            utterance: "how many customers are active?",
            schema_snapshots: &[netflix_snapshot()],
            intent: Intent::QueryData,
            dialect: Dialect::Postgres,
            cross_backend: false,
        };
        let artifact = synthesize(&gateway, input).await;

        assert_eq!(artifact.text, "SELECT * FROM customers WHERE status = :status");
        assert_eq!(artifact.params, serde_json::json!({"status": "active"}));
        assert!(artifact.placeholders_match_params());
    }
}
