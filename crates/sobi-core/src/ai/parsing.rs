//! JSON extraction from model replies
//!
//! Models wrap JSON in prose or markdown fences more often than not. These
//! helpers find the payload; deciding whether it means anything is left to
//! the validator.

use serde_json::Value;

use crate::error::{Error, Result};

/// Longest slice of a raw reply quoted in error messages
const RAW_PREVIEW_CHARS: usize = 200;

/// Shorten a reply for logs and errors (char-boundary safe)
pub fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > RAW_PREVIEW_CHARS {
        let cut: String = trimmed.chars().take(RAW_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

/// Strip a surrounding ```json ... ``` fence if present
fn strip_code_fence(s: &str) -> &str {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the language tag on the opening line
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Find the first balanced `{...}` or `[...]` starting at `start`
///
/// Brackets inside string literals are ignored.
fn balanced_end(s: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract the first JSON value (object or array) from a reply
pub fn extract_json(response: &str) -> Result<Value> {
    let body = strip_code_fence(response);

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    let mut search_from = 0;
    while let Some(offset) = body[search_from..].find(['{', '[']) {
        let start = search_from + offset;
        if let Some(end) = balanced_end(body, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&body[start..=end]) {
                return Ok(value);
            }
        }
        search_from = start + 1;
    }

    Err(Error::InvalidData(format!(
        "No JSON found in model reply | Raw: {}",
        preview(response)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_object() {
        let v = extract_json(r#"{"results": [1, 2]}"#).unwrap();
        assert_eq!(v, json!({"results": [1, 2]}));
    }

    #[test]
    fn test_extract_with_text() {
        let v = extract_json(r#"Here you go: {"results": []} hope that helps"#).unwrap();
        assert_eq!(v, json!({"results": []}));
    }

    #[test]
    fn test_extract_code_fence() {
        let reply = "```json\n{\"results\": [{\"expenditure_id\": 1, \"category_id\": 2}]}\n```";
        let v = extract_json(reply).unwrap();
        assert_eq!(v["results"][0]["category_id"], 2);
    }

    #[test]
    fn test_extract_bare_array() {
        let v = extract_json("결과: [2, 5, 6]").unwrap();
        assert_eq!(v, json!([2, 5, 6]));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let v = extract_json(r#"note {"a": "}{", "b": 1} trailing }"#).unwrap();
        assert_eq!(v, json!({"a": "}{", "b": 1}));
    }

    #[test]
    fn test_skips_unparseable_candidate() {
        let v = extract_json(r#"[not json] then {"ok": true}"#).unwrap();
        assert_eq!(v, json!({"ok": true}));
    }

    #[test]
    fn test_no_json() {
        assert!(extract_json("I cannot help with that.").is_err());
        assert!(extract_json("").is_err());
    }

    #[test]
    fn test_scalar_is_not_extracted() {
        assert!(extract_json("42").is_err());
    }

    #[test]
    fn test_preview_is_char_safe() {
        let long = "가".repeat(500);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), RAW_PREVIEW_CHARS + 3);
    }
}
