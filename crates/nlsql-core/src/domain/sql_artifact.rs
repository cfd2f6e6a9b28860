//! The synthesized-SQL artifact produced by the SQL Synthesizer (C6) and
//! consumed by the Safety Gate (C7) and Executor (C8).

use serde::{Deserialize, Serialize};

use super::backend::Dialect;

/// A synthesized SQL statement, parameterized, with provenance the
/// downstream stages rely on.
///
/// Invariant: every named placeholder appearing in `text` has a matching key
/// in `params`, and vice versa — checked by [`SqlArtifact::placeholders_match_params`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlArtifact {
    pub dialect: Dialect,
    pub text: String,
    pub params: serde_json::Value,
    /// Synthesizer's own confidence in this statement, in `[0.0, 1.0]`.
    pub confidence: f32,
    /// Free-text notes surfaced to the caller (e.g. "used default table
    /// `netflix_shows` because the query did not name one").
    pub notes: Vec<String>,
}

impl SqlArtifact {
    /// The sentinel statement returned when synthesis cannot produce
    /// anything usable; always safe to execute and always returns one row.
    pub fn sentinel(dialect: Dialect, reason: impl Into<String>) -> Self {
        Self {
            dialect,
            text: "SELECT 1 AS result".to_string(),
            params: serde_json::json!({}),
            confidence: 0.0,
            notes: vec![reason.into()],
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.text.trim().eq_ignore_ascii_case("select 1 as result")
    }

    /// The first whitespace-delimited token, uppercased — the SQL verb the
    /// Safety Gate and the read-only policy key off of.
    pub fn first_verb(&self) -> String {
        self.text
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_uppercase()
    }

    /// Every `:name`-style placeholder referenced in `text` has a matching
    /// key in `params`, and every key in `params` is referenced.
    pub fn placeholders_match_params(&self) -> bool {
        let referenced = extract_placeholders(&self.text);
        let Some(obj) = self.params.as_object() else {
            return referenced.is_empty();
        };
        let declared: std::collections::HashSet<&String> = obj.keys().collect();
        let referenced_set: std::collections::HashSet<&str> =
            referenced.iter().map(String::as_str).collect();
        referenced_set.len() == declared.len()
            && referenced_set.iter().all(|r| declared.contains(&r.to_string()))
    }
}

pub(crate) fn extract_placeholders(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = sql.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == ':' {
            let mut name = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if !name.is_empty() {
                out.push(name);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_always_safe_and_confidence_zero() {
        let artifact = SqlArtifact::sentinel(Dialect::Postgres, "ambiguous query");
        assert!(artifact.is_sentinel());
        assert_eq!(artifact.confidence, 0.0);
        assert_eq!(artifact.first_verb(), "SELECT");
    }

    #[test]
    fn test_first_verb_uppercased() {
        let artifact = SqlArtifact {
            dialect: Dialect::Postgres,
            text: "  select * from t".to_string(),
            params: serde_json::json!({}),
            confidence: 0.9,
            notes: vec![],
        };
        assert_eq!(artifact.first_verb(), "SELECT");
    }

    #[test]
    fn test_placeholders_match_params_true_when_aligned() {
        let artifact = SqlArtifact {
            dialect: Dialect::Postgres,
            text: "SELECT * FROM t WHERE status = :status".to_string(),
            params: serde_json::json!({"status": "active"}),
            confidence: 0.9,
            notes: vec![],
        };
        assert!(artifact.placeholders_match_params());
    }

    #[test]
    fn test_placeholders_match_params_false_when_extra_param() {
        let artifact = SqlArtifact {
            dialect: Dialect::Postgres,
            text: "SELECT * FROM t WHERE status = :status".to_string(),
            params: serde_json::json!({"status": "active", "extra": 1}),
            confidence: 0.9,
            notes: vec![],
        };
        assert!(!artifact.placeholders_match_params());
    }

    #[test]
    fn test_placeholders_match_params_false_when_missing_param() {
        let artifact = SqlArtifact {
            dialect: Dialect::Postgres,
            text: "SELECT * FROM t WHERE status = :status".to_string(),
            params: serde_json::json!({}),
            confidence: 0.9,
            notes: vec![],
        };
        assert!(!artifact.placeholders_match_params());
    }
}
