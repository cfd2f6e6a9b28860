//! C7 SQL Safety Gate: static, deterministic checks run on a [`SqlArtifact`]
//! before it reaches the executor.
//!
//! The dangerous-pattern list is ported verbatim from the original service's
//! `sanitize_sql` regex set, extended per this pipeline's own additions
//! (`TRUNCATE`, unpaired block comments).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{Backend, SqlArtifact};

/// Why the gate refused to let a statement through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    MultipleStatements,
    DangerousPattern(String),
    ReadOnlyViolation { attempted_verb: String },
    ParamMismatch,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::MultipleStatements => write!(f, "statement contains more than one top-level SQL statement"),
            RejectionReason::DangerousPattern(p) => write!(f, "matched disallowed pattern: {p}"),
            RejectionReason::ReadOnlyViolation { attempted_verb } => {
                write!(f, "backend is read-only; statement begins with disallowed verb {attempted_verb}")
            }
            RejectionReason::ParamMismatch => write!(f, "sql placeholders and params do not correspond 1:1"),
        }
    }
}

/// The gate's verdict on an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Ok,
    Rejected(RejectionReason),
}

impl GateOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, GateOutcome::Ok)
    }
}

static DANGEROUS_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (";\\s*DROP", Regex::new(r"(?i);\s*DROP").unwrap()),
        (";\\s*DELETE", Regex::new(r"(?i);\s*DELETE").unwrap()),
        (";\\s*UPDATE", Regex::new(r"(?i);\s*UPDATE").unwrap()),
        (";\\s*INSERT", Regex::new(r"(?i);\s*INSERT").unwrap()),
        (";\\s*ALTER", Regex::new(r"(?i);\s*ALTER").unwrap()),
        (";\\s*CREATE", Regex::new(r"(?i);\s*CREATE").unwrap()),
        (";\\s*TRUNCATE", Regex::new(r"(?i);\s*TRUNCATE").unwrap()),
        ("xp_cmdshell", Regex::new(r"(?i)xp_cmdshell").unwrap()),
        ("sp_execute", Regex::new(r"(?i)sp_execute").unwrap()),
    ]
});

/// Strip single-quoted string literal contents (not the quotes themselves)
/// so pattern matching below doesn't trip on a dangerous-looking substring
/// that's actually inside user data.
fn mask_string_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_string = false;
    for c in sql.chars() {
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
        } else if in_string {
            out.push('x');
        } else {
            out.push(c);
        }
    }
    out
}

/// Count top-level statements after stripping a trailing semicolon and line
/// comments. A semicolon inside a string literal doesn't count as a
/// statement separator.
fn count_top_level_statements(sql: &str) -> usize {
    let masked = mask_string_literals(sql);
    let trimmed = masked.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return 0;
    }
    trimmed.split(';').filter(|s| !s.trim().is_empty()).count()
}

fn has_unpaired_block_comment(sql: &str) -> bool {
    let opens = sql.matches("/*").count();
    let closes = sql.matches("*/").count();
    opens != closes
}

/// Run every static check against `artifact`, given the backend it would
/// execute against.
pub fn evaluate(artifact: &SqlArtifact, backend: &Backend) -> GateOutcome {
    if count_top_level_statements(&artifact.text) > 1 {
        return GateOutcome::Rejected(RejectionReason::MultipleStatements);
    }

    if has_unpaired_block_comment(&artifact.text) {
        return GateOutcome::Rejected(RejectionReason::DangerousPattern("unpaired /* */".to_string()));
    }

    let masked = mask_string_literals(&artifact.text);
    for (label, pattern) in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(&masked) {
            return GateOutcome::Rejected(RejectionReason::DangerousPattern((*label).to_string()));
        }
    }

    let verb = artifact.first_verb();
    if !backend.permits_verb(&verb) {
        return GateOutcome::Rejected(RejectionReason::ReadOnlyViolation { attempted_verb: verb });
    }

    if !artifact.placeholders_match_params() {
        return GateOutcome::Rejected(RejectionReason::ParamMismatch);
    }

    GateOutcome::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dialect;

    fn writable_backend() -> Backend {
        Backend {
            id: "default".into(),
            display_name: "Default".into(),
            dialect: Dialect::Postgres,
            connection_descriptor: "postgresql://x".into(),
            enabled: true,
            read_only: false,
        }
    }

    fn read_only_backend() -> Backend {
        let mut b = writable_backend();
        b.id = "db_ro".into();
        b.read_only = true;
        b
    }

    fn artifact(text: &str) -> SqlArtifact {
        SqlArtifact {
            dialect: Dialect::Postgres,
            text: text.to_string(),
            params: serde_json::json!({}),
            confidence: 0.9,
            notes: vec![],
        }
    }

    #[test]
    fn test_plain_select_is_ok() {
        let result = evaluate(&artifact("SELECT * FROM customers"), &writable_backend());
        assert_eq!(result, GateOutcome::Ok);
    }

    #[test]
    fn test_stacked_drop_is_rejected() {
        let result = evaluate(
            &artifact("SELECT * FROM customers; DROP TABLE customers"),
            &writable_backend(),
        );
        assert!(!result.is_ok());
    }

    #[test]
    fn test_xp_cmdshell_is_rejected() {
        let result = evaluate(&artifact("EXEC xp_cmdshell('dir')"), &writable_backend());
        assert!(!result.is_ok());
    }

    #[test]
    fn test_drop_table_against_read_only_backend_rejected() {
        let result = evaluate(&artifact("DROP TABLE customers"), &read_only_backend());
        assert!(!result.is_ok());
    }

    #[test]
    fn test_select_against_read_only_backend_ok() {
        let result = evaluate(&artifact("SELECT * FROM customers"), &read_only_backend());
        assert_eq!(result, GateOutcome::Ok);
    }

    #[test]
    fn test_dangerous_keyword_inside_string_literal_is_allowed() {
        let result = evaluate(
            &artifact("SELECT * FROM customers WHERE note = '; DROP TABLE x'"),
            &writable_backend(),
        );
        assert_eq!(result, GateOutcome::Ok);
    }

    #[test]
    fn test_unpaired_block_comment_rejected() {
        let result = evaluate(&artifact("SELECT * FROM t /* unterminated"), &writable_backend());
        assert!(!result.is_ok());
    }

    #[test]
    fn test_param_mismatch_rejected() {
        let mut a = artifact("SELECT * FROM t WHERE status = :status");
        a.params = serde_json::json!({});
        let result = evaluate(&a, &writable_backend());
        assert!(!result.is_ok());
    }

    #[test]
    fn test_trailing_semicolon_alone_not_multiple_statements() {
        let result = evaluate(&artifact("SELECT * FROM customers;"), &writable_backend());
        assert_eq!(result, GateOutcome::Ok);
    }
}
