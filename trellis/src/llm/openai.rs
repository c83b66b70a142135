//! OpenAI Chat Completions client implementing `LanguageModel` (ChatOpenAI).
//!
//! Sends the prompt as a single user message, optionally preceded by a system message.
//! Requires `OPENAI_API_KEY` (or explicit config); `OPENAI_BASE_URL` points it at any
//! OpenAI-compatible server.

use async_trait::async_trait;
use tracing::{debug, trace};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
    },
    Client,
};

use super::{LanguageModel, LlmError};

/// OpenAI-compatible chat client.
///
/// **Interaction**: Built by the `trellis` CLI from env; used as `Arc<dyn LanguageModel>` by
/// the engine and by `LanguageModelAgent`.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: Option<String>,
    temperature: Option<f32>,
}

impl ChatOpenAI {
    /// Build client with default config (API key from `OPENAI_API_KEY` env).
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_config(Self::config_from_env(), model)
    }

    /// Build client with custom config (e.g. custom API key or base URL).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            system_prompt: None,
            temperature: None,
        }
    }

    /// Config from `OPENAI_API_KEY` and `OPENAI_BASE_URL` (or `OPENAI_API_BASE`).
    pub fn config_from_env() -> OpenAIConfig {
        let mut config = OpenAIConfig::new();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config = config.with_api_key(key);
        }
        if let Ok(base) = std::env::var("OPENAI_BASE_URL").or_else(|_| std::env::var("OPENAI_API_BASE")) {
            config = config.with_api_base(base.trim_end_matches('/'));
        }
        config
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set temperature (0–2). Lower values are more deterministic.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_messages(&self, prompt: &str) -> Vec<ChatCompletionRequestMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.system_prompt {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage::from(system.as_str()),
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage::from(prompt),
        ));
        messages
    }
}

#[async_trait]
impl LanguageModel for ChatOpenAI {
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(self.request_messages(prompt));
        if let Some(t) = self.temperature {
            args.temperature(t);
        }
        let request = args
            .build()
            .map_err(|e| LlmError::Request(format!("OpenAI request build failed: {}", e)))?;

        debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            temperature = ?self.temperature,
            "OpenAI chat create"
        );
        trace!(prompt = %prompt, "OpenAI prompt");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Request(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;
        let content = choice.message.content.unwrap_or_default();
        trace!(reply = %content, "OpenAI reply");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_messages_include_system_prompt_first() {
        let llm = ChatOpenAI::with_config(OpenAIConfig::new(), "gpt-4o-mini")
            .with_system_prompt("route carefully");
        let messages = llm.request_messages("pick one");
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert_eq!(llm.model(), "gpt-4o-mini");
    }

    #[test]
    fn request_messages_without_system_prompt() {
        let llm = ChatOpenAI::with_config(OpenAIConfig::new(), "m");
        assert_eq!(llm.request_messages("x").len(), 1);
    }
}
