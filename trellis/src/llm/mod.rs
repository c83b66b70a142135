//! Language-model port: a callable that takes a prompt and returns text.
//!
//! The engine makes at most one call per condition evaluation and one per non-text output
//! formatting. Implementations: [`MockLanguageModel`] for tests, [`ChatOpenAI`] for
//! OpenAI-compatible endpoints.

mod mock;
mod openai;

pub use mock::MockLanguageModel;
pub use openai::ChatOpenAI;

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single model call. The engine never retries it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport, API or request-building failure.
    #[error("language model request failed: {0}")]
    Request(String),
    /// The model answered without any choice or content.
    #[error("language model returned no content")]
    EmptyResponse,
}

/// Prompt in, text out.
///
/// **Interaction**: Held as `Arc<dyn LanguageModel>` by `Engine`, `ConditionRouter`,
/// `ResponseFormatter` and `LanguageModelAgent`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError>;
}
