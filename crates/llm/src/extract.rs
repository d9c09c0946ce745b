//! Tolerant JSON extraction from model replies.
//!
//! Models wrap JSON in prose, markdown fences, or both. The strategies
//! here are tried in order until one parses; callers fall back to a
//! deterministic default when all of them fail.

use std::sync::OnceLock;

use regex::Regex;

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // ```json ... ``` or a bare ``` ... ``` fence.
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence regex")
    })
}

/// Extract a JSON value from a model reply.
///
/// Strategies, in order:
/// 1. the first fenced code block;
/// 2. the first braced/bracketed span (`{...}` or `[...]`, outermost);
/// 3. the whole reply.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    if let Some(caps) = fenced_block_re().captures(text) {
        if let Ok(v) = serde_json::from_str(&caps[1]) {
            return Some(v);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(span) = outermost_span(text, open, close) {
            if let Ok(v) = serde_json::from_str(span) {
                return Some(v);
            }
        }
    }

    serde_json::from_str(text.trim()).ok()
}

/// Extract a JSON array from a model reply.
///
/// Same strategies as [`extract_json`], but the bracket scan prefers
/// `[...]` spans and non-array results are rejected.
pub fn extract_json_array(text: &str) -> Option<serde_json::Value> {
    if let Some(caps) = fenced_block_re().captures(text) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&caps[1]) {
            if v.is_array() {
                return Some(v);
            }
        }
    }

    if let Some(span) = outermost_span(text, '[', ']') {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(span) {
            if v.is_array() {
                return Some(v);
            }
        }
    }

    serde_json::from_str::<serde_json::Value>(text.trim())
        .ok()
        .filter(|v| v.is_array())
}

/// The span from the first `open` to the matching `close`, tracking
/// nesting depth but not string literals. Good enough for model output;
/// the result still has to parse as JSON to be accepted.
fn outermost_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..start + i + c.len_utf8()]);
            }
        }
    }
    None
}
