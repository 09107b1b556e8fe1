//! Best-effort structured decode of free-text collaborator replies.
//!
//! Language models are asked for "ONLY a JSON object" and routinely answer
//! with something else: the object wrapped in ```` ```json ```` fences,
//! preceded by "Sure! Here is…", or followed by a closing remark. This module
//! recovers the object when it is there and reports a [`DecodeError`] when it
//! is not. It never panics on untrusted input and performs no I/O, so it is
//! tested independently of any network call.

use crate::error::DecodeError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json|JSON)?").unwrap());

/// Extract the first JSON object embedded in `text`.
///
/// 1. Remove markdown fence markers anywhere in the reply.
/// 2. Find the next top-level `{` and its matching `}` (string- and
///    escape-aware, so braces inside JSON strings do not count).
/// 3. Return the span if it parses as a JSON object; otherwise continue
///    after it. Objects nested inside a rejected span are never returned.
/// 4. A `{` that is never closed is prose ("see {page 3") unless it opens a
///    key. Prose braces are stepped over; a cut-off object ends the scan.
///
/// The error reported is the one for the last span tried.
pub fn extract_json(text: &str) -> Result<Map<String, Value>, DecodeError> {
    let cleaned = RE_FENCE.replace_all(text, "");
    let mut rest = cleaned.trim();

    let mut last_err = DecodeError::NoJsonObject;
    while let Some(start) = rest.find('{') {
        let candidate = &rest[start..];
        let Some(end) = balanced_object_end(candidate) else {
            last_err = DecodeError::Unbalanced;
            if opens_key(candidate) {
                break;
            }
            rest = &candidate[1..];
            continue;
        };
        match serde_json::from_str::<Value>(&candidate[..end]) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => last_err = DecodeError::NotAnObject,
            Err(e) => last_err = DecodeError::Malformed(e.to_string()),
        }
        rest = &candidate[end..];
    }
    Err(last_err)
}

/// Whether the `{` at the start of `s` is followed by a quoted key.
fn opens_key(s: &str) -> bool {
    s[1..].trim_start().starts_with('"')
}

/// Byte offset just past the `}` matching the `{` at the start of `s`.
fn balanced_object_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
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
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn plain_object() {
        assert_eq!(extract_json(r#"{"a":1}"#), Ok(obj(json!({"a": 1}))));
    }

    #[test]
    fn fenced_object_with_chatter() {
        let reply = "Sure! ```json\n{\"a\":1}\n``` thanks";
        assert_eq!(extract_json(reply), Ok(obj(json!({"a": 1}))));
    }

    #[test]
    fn nested_objects_and_braces_in_strings() {
        let reply = r#"Result: {"note": "use {curly} \"quoted\" braces", "inner": {"x": [1, 2]}} done"#;
        assert_eq!(
            extract_json(reply),
            Ok(obj(json!({
                "note": "use {curly} \"quoted\" braces",
                "inner": {"x": [1, 2]}
            })))
        );
    }

    #[test]
    fn skips_prose_braces_before_the_object() {
        let reply = "Pages {1,2} look like bills:\n{\"itemized_bill\": [1, 2]}";
        assert_eq!(
            extract_json(reply),
            Ok(obj(json!({"itemized_bill": [1, 2]})))
        );
    }

    #[test]
    fn first_object_wins() {
        let reply = r#"{"a": 1} and also {"b": 2}"#;
        assert_eq!(extract_json(reply), Ok(obj(json!({"a": 1}))));
    }

    #[test]
    fn no_object_at_all() {
        assert_eq!(
            extract_json("I could not find any pages."),
            Err(DecodeError::NoJsonObject)
        );
        assert_eq!(extract_json(""), Err(DecodeError::NoJsonObject));
        assert_eq!(extract_json("[1, 2, 3]"), Err(DecodeError::NoJsonObject));
    }

    #[test]
    fn unclosed_object() {
        assert_eq!(
            extract_json(r#"{"a": {"b": 1}"#),
            Err(DecodeError::Unbalanced)
        );
    }

    #[test]
    fn unclosed_prose_brace_is_stepped_over() {
        assert_eq!(
            extract_json("Note {see pages below\n{\"a\":1}"),
            Ok(obj(json!({"a": 1})))
        );
        assert_eq!(
            extract_json(r#"I think {it's "odd} here. {"a":1}"#),
            Ok(obj(json!({"a": 1})))
        );
        assert_eq!(
            extract_json("Pages {2, 3 are bills."),
            Err(DecodeError::Unbalanced)
        );
    }

    #[test]
    fn cut_off_object_does_not_yield_its_items() {
        assert_eq!(
            extract_json(r#"{"items": [{"total_cost": 10}, {"total_cost": 2"#),
            Err(DecodeError::Unbalanced)
        );
    }

    #[test]
    fn inner_object_of_a_rejected_span_is_not_returned() {
        assert!(matches!(
            extract_json(r#"{"a": 1, "b": {"c": 2},}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn malformed_object() {
        assert!(matches!(
            extract_json(r#"{"a": 1,}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            extract_json("{name: 'x'}"),
            Err(DecodeError::Malformed(_))
        ));
    }
}
