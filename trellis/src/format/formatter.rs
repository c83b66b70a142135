//! Response formatter: pass-through for `"text"`, one model call otherwise.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::extract::{extract_json, Extraction};
use crate::context::value_text;
use crate::definition::TEXT_SCHEMA;
use crate::llm::LanguageModel;

/// Best-effort formatter; never fails.
///
/// **Interaction**: Called by the engine walk when it reaches an `output` node.
pub struct ResponseFormatter {
    llm: Arc<dyn LanguageModel>,
}

impl ResponseFormatter {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Returns `value` unchanged for the `"text"` schema. Otherwise asks the model to
    /// reshape it and extracts JSON from the reply; a model failure yields `value` as is.
    pub async fn format(&self, value: &Value, schema: &str) -> Value {
        if schema.trim() == TEXT_SCHEMA {
            return value.clone();
        }
        let prompt = build_format_prompt(value, schema);
        match self.llm.invoke(&prompt).await {
            Ok(reply) => match extract_json(&reply) {
                Extraction::Parsed { value, strategy } => {
                    debug!(strategy, "formatted output parsed");
                    value
                }
                raw @ Extraction::Raw(_) => {
                    warn!("formatted output is not JSON, returning text");
                    raw.into_value()
                }
            },
            Err(e) => {
                warn!(error = %e, "output formatting failed, returning raw value");
                value.clone()
            }
        }
    }
}

pub fn build_format_prompt(value: &Value, schema: &str) -> String {
    format!(
        "Rewrite the content below so it matches the requested output schema.\n\
         Reply with JSON only.\n\nSchema:\n{}\n\nContent:\n{}\n",
        schema,
        value_text(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;
    use serde_json::json;

    /// **Scenario**: Format(v, "text") == v for strings and structured values, with no model call.
    #[tokio::test]
    async fn text_schema_passes_through() {
        let llm = Arc::new(MockLanguageModel::with_reply("unused"));
        let f = ResponseFormatter::new(llm.clone());
        for v in [json!("42"), json!({"a": [1, 2]}), json!(null), json!(3.5)] {
            assert_eq!(f.format(&v, "text").await, v);
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn schema_reply_in_fence_is_parsed() {
        let llm = Arc::new(MockLanguageModel::with_reply(
            "```json\n{\"answer\": \"42\"}\n```",
        ));
        let f = ResponseFormatter::new(llm.clone());
        let out = f.format(&json!("42"), r#"{"answer": "string"}"#).await;
        assert_eq!(out, json!({"answer": "42"}));
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains(r#"{"answer": "string"}"#));
        assert!(prompt.contains("Content:\n42"));
    }

    #[tokio::test]
    async fn prose_reply_becomes_text() {
        let f = ResponseFormatter::new(Arc::new(MockLanguageModel::with_reply("  just words ")));
        assert_eq!(f.format(&json!("x"), "bullet list").await, json!("just words"));
    }

    #[tokio::test]
    async fn model_failure_returns_raw_value() {
        let f = ResponseFormatter::new(Arc::new(MockLanguageModel::failing("down")));
        assert_eq!(f.format(&json!("raw"), "json").await, json!("raw"));
    }
}
