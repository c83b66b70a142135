//! Mock language model for tests and demos.
//!
//! Returns a fixed reply, a script of replies (the last one repeats), or always fails.
//! Records every prompt so tests can assert on what the engine asked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{LanguageModel, LlmError};

/// Scripted [`LanguageModel`].
///
/// **Interaction**: Passed to `Engine::new` in tests; `call_count()` lets a test assert that a
/// single-target hop made no model call.
pub struct MockLanguageModel {
    replies: Vec<String>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    /// Always answers `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self::with_replies(vec![reply.into()])
    }

    /// Answers the replies in order; after the last one, keeps answering it.
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies,
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `LlmError::Request(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::with_replies(Vec::new())
        }
    }

    /// Sleep before answering (builder). Used to hold a run at a suspension point.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.prompts.lock() {
            Ok(mut p) => p.push(prompt.to_string()),
            Err(e) => e.into_inner().push(prompt.to_string()),
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref message) = self.failure {
            return Err(LlmError::Request(message.clone()));
        }
        let last = self.replies.len().checked_sub(1).ok_or(LlmError::EmptyResponse)?;
        Ok(self.replies[n.min(last)].clone())
    }
}
