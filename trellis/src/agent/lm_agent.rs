//! Agent backed directly by a language model, with per-thread conversation memory.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use tracing::debug;

use super::{
    AgentError, AgentInput, AgentPort, AgentRequest, AgentResponse, PauseReason, ResumeDecision,
    TraceMessage,
};
use crate::context::ThreadKey;
use crate::llm::LanguageModel;

const PLAN_INSTRUCTION: &str = "Before doing the task, write a short numbered plan of the steps you \
would take. Reply with the plan only; do not carry it out yet.";
const APPROVED_INSTRUCTION: &str = "The plan was approved. Carry it out and reply with the final answer only.";
const REJECTED_INSTRUCTION: &str = "The plan was rejected by the reviewer. Answer the task directly \
without following that plan, and reply with the final answer only.";

/// [`AgentPort`] that answers with one model call per turn.
///
/// Conversation history is kept per [`ThreadKey`], so a node revisited in the same run (or
/// resumed after review) sees its earlier turns. With `plan_review` set, the first turn
/// drafts a plan and pauses; the decision turn then executes or abandons it. This agent
/// has no tools, so tool reviews are never requested and tool decisions are rejected.
pub struct LanguageModelAgent {
    llm: Arc<dyn LanguageModel>,
    threads: DashMap<ThreadKey, Vec<TraceMessage>>,
}

impl LanguageModelAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            threads: DashMap::new(),
        }
    }

    /// Number of turns remembered for `thread`.
    pub fn history_len(&self, thread: &ThreadKey) -> usize {
        self.threads.get(thread).map(|h| h.len()).unwrap_or(0)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Forgets every thread of `execution_id`; returns how many were dropped.
    pub fn forget_execution(&self, execution_id: &str) -> usize {
        let before = self.threads.len();
        self.threads.retain(|key, _| key.execution_id != execution_id);
        before.saturating_sub(self.threads.len())
    }

    /// Seeds `thread` with earlier turns, e.g. when resuming in a fresh process that never saw
    /// the paused turn. Existing history for the thread is kept.
    pub fn restore_thread(&self, thread: ThreadKey, history: Vec<TraceMessage>) {
        self.threads.entry(thread).or_insert(history);
    }

    fn render(agent_id: &str, history: &[TraceMessage]) -> String {
        let mut prompt = format!("You are agent `{}`.\n\n", agent_id);
        for m in history {
            prompt.push_str(&m.role);
            prompt.push_str(": ");
            prompt.push_str(&m.content);
            prompt.push_str("\n\n");
        }
        prompt.push_str("assistant:");
        prompt
    }
}

#[async_trait]
impl AgentPort for LanguageModelAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        // Clone out of the map; no DashMap guard may live across an await.
        let mut history = self
            .threads
            .get(&request.thread)
            .map(|h| h.value().clone())
            .unwrap_or_default();
        let turn_start = history.len();

        let pause_for_plan = match request.input {
            AgentInput::Query { ref prompt } => {
                history.push(TraceMessage::new("user", prompt.clone()));
                if request.verifiers.plan_review {
                    history.push(TraceMessage::new("user", PLAN_INSTRUCTION));
                    true
                } else {
                    false
                }
            }
            AgentInput::Decision {
                reason: PauseReason::PlanReview,
                ref decision,
            } => {
                let instruction = match decision {
                    ResumeDecision::Approved => APPROVED_INSTRUCTION,
                    ResumeDecision::Rejected => REJECTED_INSTRUCTION,
                    ResumeDecision::Revised(_) => {
                        return Err(AgentError::UnsupportedDecision(
                            "revised arguments answer a tool review, not a plan".to_string(),
                        ))
                    }
                };
                history.push(TraceMessage::new("user", instruction));
                false
            }
            AgentInput::Decision {
                reason: PauseReason::ToolReview,
                ..
            } => {
                return Err(AgentError::UnsupportedDecision(format!(
                    "agent {} has no tools to review",
                    request.agent_id
                )))
            }
        };

        let reply = self
            .llm
            .invoke(&Self::render(&request.agent_id, &history))
            .await?;
        history.push(TraceMessage::new(
            if pause_for_plan { "plan" } else { "assistant" },
            reply.clone(),
        ));
        let trace = history[turn_start..].to_vec();
        debug!(
            agent_id = %request.agent_id,
            thread = %request.thread,
            turns = history.len(),
            "agent turn complete"
        );
        self.threads.insert(request.thread, history);

        let response = if pause_for_plan {
            AgentResponse::paused(PauseReason::PlanReview, json!({ "plan": reply }))
        } else if reply.trim().is_empty() {
            AgentResponse::empty()
        } else {
            AgentResponse::completed(reply)
        };
        Ok(response.with_trace(trace))
    }

    fn end_execution(&self, execution_id: &str) {
        let dropped = self.forget_execution(execution_id);
        debug!(execution_id, dropped, "agent threads released");
    }
}
