//! Best-effort structured decode for model output.
//!
//! Fact extraction asks the model for a raw JSON object, but local models
//! routinely wrap it in a `<think>` block, a markdown fence, or prose. The
//! fallback order is fixed and each step is independently testable:
//!
//! 1. strip a `<think>…</think>` wrapper
//! 2. strip markdown code fences
//! 3. direct JSON parse
//! 4. regex-extract the outermost `{…}` span and parse that
//! 5. give up → empty map
//!
//! Decoding never fails; the worst case is an empty result.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

fn brace_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Remove a leading `<think>…</think>` block, keeping what follows.
pub fn strip_thinking(raw: &str) -> &str {
    if raw.contains("<think>") {
        if let Some(end) = raw.rfind("</think>") {
            return raw[end + "</think>".len()..].trim();
        }
    }
    raw.trim()
}

/// Remove a markdown code fence, keeping the fenced body.
/// A language tag on the opening fence (```json) is discarded.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let Some(end) = trimmed.rfind("```") else {
        return trimmed;
    };
    if end <= start {
        return trimmed;
    }

    let body = &trimmed[start + 3..end];
    // Drop the language specifier line if present
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Coerce a parsed JSON value into a topic → facts map.
///
/// Accepts `{"topic": ["fact", …]}` as well as the looser shapes models
/// produce: a bare string fact becomes a one-element list, non-string list
/// entries are dropped.
fn coerce_topic_map(value: serde_json::Value) -> Option<HashMap<String, Vec<String>>> {
    let object = value.as_object()?;
    let mut map = HashMap::new();
    for (topic, entry) in object {
        let facts: Vec<String> = match entry {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            serde_json::Value::String(fact) => vec![fact.clone()],
            _ => Vec::new(),
        };
        if !facts.is_empty() {
            map.insert(topic.clone(), facts);
        }
    }
    Some(map)
}

/// Decode a topic → facts mapping from raw model output.
///
/// Returns an empty map on any unrecoverable parse failure — never an error.
pub fn decode_topic_map(raw: &str) -> HashMap<String, Vec<String>> {
    let cleaned = strip_code_fences(strip_thinking(raw));

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) {
        if let Some(map) = coerce_topic_map(value) {
            return map;
        }
    }

    // Salvage pass: find the outermost brace span and try again.
    if let Some(span) = brace_span().find(cleaned) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(span.as_str()) {
            if let Some(map) = coerce_topic_map(value) {
                debug!("Recovered JSON object via brace extraction");
                return map;
            }
        }
    }

    debug!(raw_len = raw.len(), "Unparseable extraction output, returning empty map");
    HashMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_parse() {
        let map = decode_topic_map(r#"{"project": ["deadline Friday"], "contact": ["alice"]}"#);
        assert_eq!(map.len(), 2);
        assert_eq!(map["project"], vec!["deadline Friday"]);
    }

    #[test]
    fn strips_thinking_block() {
        let raw = "<think>the user mentioned a deadline</think>\n{\"deadline\": [\"Friday\"]}";
        assert_eq!(strip_thinking(raw), "{\"deadline\": [\"Friday\"]}");
        let map = decode_topic_map(raw);
        assert_eq!(map["deadline"], vec!["Friday"]);
    }

    #[test]
    fn strips_code_fence_with_language() {
        let raw = "```json\n{\"a\": [\"b\"]}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": [\"b\"]}");
        assert_eq!(decode_topic_map(raw)["a"], vec!["b"]);
    }

    #[test]
    fn strips_bare_code_fence() {
        let raw = "```{\"a\": [\"b\"]}```";
        assert_eq!(decode_topic_map(raw)["a"], vec!["b"]);
    }

    #[test]
    fn brace_extraction_recovers_from_prose() {
        let raw = "Sure! Here are the facts: {\"meeting\": [\"standup at 9\"]} Hope that helps.";
        let map = decode_topic_map(raw);
        assert_eq!(map["meeting"], vec!["standup at 9"]);
    }

    #[test]
    fn fence_then_thinking_then_prose() {
        let raw = "<think>hmm</think>\n```json\nFacts below {\"k\": [\"v\"]}\n```";
        assert_eq!(decode_topic_map(raw)["k"], vec!["v"]);
    }

    #[test]
    fn garbage_yields_empty() {
        assert!(decode_topic_map("not json at all").is_empty());
        assert!(decode_topic_map("").is_empty());
        assert!(decode_topic_map("{broken: json").is_empty());
    }

    #[test]
    fn non_object_yields_empty() {
        assert!(decode_topic_map("[1, 2, 3]").is_empty());
        assert!(decode_topic_map("\"just a string\"").is_empty());
    }

    #[test]
    fn bare_string_fact_coerced_to_list() {
        let map = decode_topic_map(r#"{"email": "bob@example.com"}"#);
        assert_eq!(map["email"], vec!["bob@example.com"]);
    }

    #[test]
    fn non_string_entries_dropped() {
        let map = decode_topic_map(r#"{"nums": [1, 2, "three"]}"#);
        assert_eq!(map["nums"], vec!["three"]);
    }

    #[test]
    fn empty_object_is_empty_map() {
        assert!(decode_topic_map("{}").is_empty());
    }

    #[test]
    fn unclosed_thinking_left_alone() {
        let raw = "<think>never closed {\"a\": [\"b\"]}";
        // No </think> terminator: the wrapper strip is a no-op, the brace
        // extraction still recovers the object.
        assert_eq!(decode_topic_map(raw)["a"], vec!["b"]);
    }
}
