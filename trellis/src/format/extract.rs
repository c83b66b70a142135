//! Ordered chain of JSON extraction strategies for model replies.
//!
//! Each strategy takes the raw reply and returns `Some(value)` when it recovers JSON.
//! [`extract_json`] tries them in [`STRATEGIES`] order and falls back to the trimmed text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub type Strategy = fn(&str) -> Option<Value>;

/// Tried in this order; the name is reported with the parsed value.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("fenced_block", parse_fenced_block),
    ("stripped_fences", parse_stripped_fences),
    ("outer_span", parse_outer_span),
];

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("valid regex"));
static FENCE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?").expect("valid regex"));
static OUTER_SPANS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?s)\{.*\}|\[.*\]").expect("valid regex"),
        Regex::new(r"(?s)\{.*\}").expect("valid regex"),
        Regex::new(r"(?s)\[.*\]").expect("valid regex"),
    ]
});

/// Outcome of [`extract_json`].
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction {
    Parsed { value: Value, strategy: &'static str },
    /// No strategy succeeded; the trimmed reply.
    Raw(String),
}

impl Extraction {
    /// Parsed value, or the raw text as a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Extraction::Parsed { value, .. } => value,
            Extraction::Raw(text) => Value::String(text),
        }
    }
}

pub fn extract_json(text: &str) -> Extraction {
    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(text) {
            return Extraction::Parsed {
                value,
                strategy: name,
            };
        }
    }
    Extraction::Raw(text.trim().to_string())
}

pub fn parse_direct(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Interior of the first fenced block (```json, ```JSON or plain ```) that parses.
pub fn parse_fenced_block(text: &str) -> Option<Value> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| parse_direct(m.as_str()))
}

pub fn parse_stripped_fences(text: &str) -> Option<Value> {
    if !text.contains("```") {
        return None;
    }
    parse_direct(&FENCE_MARKER.replace_all(text, ""))
}

/// Outermost `{...}` or `[...]` span, whichever starts first; then each bracket kind alone.
pub fn parse_outer_span(text: &str) -> Option<Value> {
    OUTER_SPANS
        .iter()
        .filter_map(|re| re.find(text))
        .find_map(|m| parse_direct(m.as_str()))
}
