//! Content digest used as the Result Cache key (C3) and, more generally,
//! anywhere a stable content address is needed.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// A validated SHA-256 hex digest. The inner string is always 64 lowercase
/// hex characters — guaranteed by [`ContentDigest::from_bytes`] and the
/// fallible [`TryFrom<String>`] conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log-friendly short ids.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("not a valid sha-256 hex digest: {s}"));
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

/// Normalize SQL text for cache-key purposes: collapse whitespace runs,
/// strip a trailing semicolon, and fold case — but leave the contents of
/// quoted string literals untouched (case included).
///
/// This mirrors the Result Cache's normalization invariant (§8, property 7):
/// `SELECT 1`, `select 1 ;`, and `SELECT  1` must map to the same key, which
/// requires case-folding outside of quoted literals, not just whitespace
/// collapsing.
pub fn normalize_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_string = false;
    let mut quote_char = '\0';
    let mut prev_was_space = false;

    for c in sql.trim().chars() {
        if in_string {
            out.push(c);
            if c == quote_char {
                in_string = false;
            }
            continue;
        }
        if c == '\'' || c == '"' {
            in_string = true;
            quote_char = c;
            out.push(c);
            prev_was_space = false;
            continue;
        }
        if c.is_whitespace() {
            if !prev_was_space && !out.is_empty() {
                out.push(' ');
            }
            prev_was_space = true;
            continue;
        }
        prev_was_space = false;
        out.extend(c.to_lowercase());
    }

    while out.ends_with(' ') {
        out.pop();
    }
    while out.ends_with(';') {
        out.pop();
        while out.ends_with(' ') {
            out.pop();
        }
    }
    out
}

/// Compute the Result Cache key: `SHA-256(backend_id || 0x1f || normalized_sql || 0x1f || canonical_json(params))`.
pub fn result_cache_key(
    backend_id: &str,
    sql: &str,
    params: &serde_json::Value,
) -> ContentDigest {
    let mut buf = Vec::new();
    buf.extend_from_slice(backend_id.as_bytes());
    buf.push(0x1f);
    buf.extend_from_slice(normalize_sql(sql).as_bytes());
    buf.push(0x1f);
    // serde_json::Value serializes maps with sorted keys only via BTreeMap;
    // canonicalize explicitly so key order never affects the digest.
    buf.extend_from_slice(canonical_json(params).as_bytes());
    ContentDigest::from_bytes(&buf)
}

fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap(), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_rejects_wrong_length() {
        assert!(ContentDigest::try_from("abc".to_string()).is_err());
    }

    #[test]
    fn test_normalize_sql_collapses_whitespace_and_strips_semicolon() {
        assert_eq!(normalize_sql("SELECT  1"), "select 1");
        assert_eq!(normalize_sql("select 1 ;"), "select 1");
        assert_eq!(normalize_sql("SELECT 1"), "select 1");
    }

    #[test]
    fn test_normalize_sql_preserves_case_inside_quotes() {
        let sql = "SELECT * FROM t WHERE name = 'MixedCase'  ;";
        let normalized = normalize_sql(sql);
        assert!(normalized.contains("'MixedCase'"));
        assert_eq!(normalized, "select * from t where name = 'MixedCase'");
    }

    #[test]
    fn test_result_cache_key_stable_under_whitespace_normalization() {
        let params = serde_json::json!({});
        let a = result_cache_key("default", "SELECT 1", &params);
        let b = result_cache_key("default", "select 1 ;", &params);
        let c = result_cache_key("default", "SELECT  1", &params);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_result_cache_key_insensitive_to_param_key_order() {
        let a = result_cache_key("default", "SELECT 1", &serde_json::json!({"a": 1, "b": 2}));
        let b = result_cache_key("default", "SELECT 1", &serde_json::json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_result_cache_key_differs_by_backend() {
        let params = serde_json::json!({});
        let a = result_cache_key("default", "SELECT 1", &params);
        let b = result_cache_key("db_1", "SELECT 1", &params);
        assert_ne!(a, b);
    }
}
