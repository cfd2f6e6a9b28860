//! Best-effort JSON extraction from raw LLM completion text.
//!
//! Models routinely wrap JSON in markdown code fences or pad it with prose.
//! This performs the same two-pass recovery the original service did before
//! handing a response to `serde_json`: strip fences first, then fall back to
//! the widest balanced `{...}` span in the text.

/// Strip a leading/trailing ```` ```json ```` or ```` ``` ```` fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches(['\n', '\r']);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim();
        }
        return rest.trim();
    }
    trimmed
}

/// Extract the first balanced `{...}` span from `text`, accounting for
/// braces inside string literals so a `}` in a quoted value doesn't close
/// the object early.
fn extract_first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `text` as JSON, tolerating code fences and leading/trailing prose.
pub fn repair_and_parse(text: &str) -> Result<serde_json::Value, serde_json::Error> {
    let stripped = strip_code_fences(text);
    if let Ok(v) = serde_json::from_str(stripped) {
        return Ok(v);
    }
    if let Some(obj) = extract_first_json_object(stripped) {
        return serde_json::from_str(obj);
    }
    serde_json::from_str(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_json_tag() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_without_tag() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_noop_on_plain_text() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_repair_and_parse_handles_leading_prose() {
        let raw = "Here is the SQL:\n```json\n{\"sql\": \"SELECT 1\"}\n```\nLet me know if that helps.";
        let value = repair_and_parse(raw).unwrap();
        assert_eq!(value["sql"], "SELECT 1");
    }

    #[test]
    fn test_repair_and_parse_ignores_braces_inside_strings() {
        let raw = "{\"note\": \"a {nested} brace\", \"ok\": true}";
        let value = repair_and_parse(raw).unwrap();
        assert_eq!(value["ok"], true);
    }
}
