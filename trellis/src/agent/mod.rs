//! Agent collaborator port.
//!
//! An agent node delegates its work to an [`AgentPort`]. The engine sends either a fresh
//! query or, when resuming, the human decision for a pending review. The agent answers
//! with final text or with a pause signal, plus the intermediate trace it produced.

mod decision;
mod lm_agent;
mod scripted;

pub use decision::ResumeDecision;
pub use lm_agent::LanguageModelAgent;
pub use scripted::ScriptedAgent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::context::ThreadKey;
use crate::llm::LlmError;

/// Why an agent stopped before finishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    PlanReview,
    ToolReview,
}

impl PauseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseReason::PlanReview => "plan_review",
            PauseReason::ToolReview => "tool_review",
        }
    }
}

/// Which reviews the agent must stop for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierFlags {
    pub plan_review: bool,
    pub tool_review: bool,
}

/// What the agent is asked to do on this call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentInput {
    /// Fresh work: the effective prompt built from the query and visible inputs.
    Query { prompt: String },
    /// Continue a paused session with the reviewer's decision.
    Decision {
        reason: PauseReason,
        decision: ResumeDecision,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentRequest {
    pub agent_id: String,
    pub input: AgentInput,
    /// Same key on every visit of the same node within one run.
    pub thread: ThreadKey,
    pub verifiers: VerifierFlags,
}

/// One intermediate message the agent produced (thoughts, tool calls, tool results...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMessage {
    pub role: String,
    pub content: String,
}

impl TraceMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Agent asked for human approval instead of finishing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PauseSignal {
    pub reason: PauseReason,
    /// Plan text or pending tool calls, shown to the reviewer as-is.
    pub payload: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AgentOutcome {
    /// `None` means the agent ended without producing any output.
    Completed { final_text: Option<String> },
    Paused(PauseSignal),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentResponse {
    pub outcome: AgentOutcome,
    pub trace: Vec<TraceMessage>,
}

impl AgentResponse {
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            outcome: AgentOutcome::Completed {
                final_text: Some(text.into()),
            },
            trace: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            outcome: AgentOutcome::Completed { final_text: None },
            trace: Vec::new(),
        }
    }

    pub fn paused(reason: PauseReason, payload: Value) -> Self {
        Self {
            outcome: AgentOutcome::Paused(PauseSignal { reason, payload }),
            trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: Vec<TraceMessage>) -> Self {
        self.trace = trace;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("agent {agent_id} failed: {message}")]
    Failed { agent_id: String, message: String },
    #[error("agent cannot handle decision: {0}")]
    UnsupportedDecision(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// The agent runtime an agent node delegates to.
///
/// **Interaction**: Held as `Arc<dyn AgentPort>` by `Engine`; invoked once per agent-node
/// dispatch and once per resume. `Engine` calls [`AgentPort::end_execution`] when a run
/// completes or fails, never when it suspends.
#[async_trait]
pub trait AgentPort: Send + Sync {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, AgentError>;

    /// Drops any per-thread state kept for `execution_id`. The run will not resume.
    fn end_execution(&self, _execution_id: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pause_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(PauseReason::ToolReview).unwrap(),
            json!("tool_review")
        );
        assert_eq!(PauseReason::PlanReview.as_str(), "plan_review");
    }

    #[test]
    fn agent_input_is_tagged() {
        let v = serde_json::to_value(AgentInput::Query {
            prompt: "hi".into(),
        })
        .unwrap();
        assert_eq!(v, json!({"kind": "query", "prompt": "hi"}));
    }

    #[test]
    fn response_helpers() {
        let r = AgentResponse::completed("42").with_trace(vec![TraceMessage::new("tool", "calc")]);
        assert_eq!(
            r.outcome,
            AgentOutcome::Completed {
                final_text: Some("42".into())
            }
        );
        assert_eq!(r.trace.len(), 1);
        assert!(matches!(
            AgentResponse::paused(PauseReason::PlanReview, json!("p")).outcome,
            AgentOutcome::Paused(PauseSignal {
                reason: PauseReason::PlanReview,
                ..
            })
        ));
    }
}
