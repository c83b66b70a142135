//! Run inputs and outcomes: what starts a run, what a run returns, and the serializable
//! continuation that lets a paused run be resumed later.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{PauseReason, ResumeDecision};
use crate::context::{
    compose_agent_prompt, value_text, ExecutorMessage, InputValues, NodeStates, ThreadKey,
    QUERY_KEY,
};
use crate::definition::AccessibleInputs;

/// Input of a fresh run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunInput {
    pub session_id: String,
    pub query: String,
    /// Defaults to `EngineConfig::default_model`.
    pub model_name: Option<String>,
    /// Defaults to a new UUID v4.
    pub execution_id: Option<String>,
}

impl RunInput {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            model_name: None,
            execution_id: None,
        }
    }

    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }
}

/// Everything needed to resume a run paused at an agent node.
///
/// Returned in place of a completion when an agent asks for review; serialize it, show
/// `payload` to the reviewer, then call [`Continuation::resume_with`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    pub execution_id: String,
    pub pipeline_id: String,
    pub session_id: String,
    pub model_name: String,
    pub node_id: String,
    pub node_name: String,
    pub agent_id: String,
    pub thread: ThreadKey,
    pub reason: PauseReason,
    /// Plan or pending tool calls awaiting approval.
    pub payload: Value,
    pub node_states: NodeStates,
    pub input_values: InputValues,
    #[serde(default)]
    pub executor_messages: Vec<ExecutorMessage>,
    #[serde(default)]
    pub current_response: Option<Value>,
    /// Step order of the last successfully recorded step.
    pub last_step_order: u64,
    /// Run time accumulated before the pause.
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl Continuation {
    /// Prompt the paused node was dispatched with, given its input visibility. Input values
    /// do not change while a node is paused.
    pub fn agent_prompt(&self, access: &AccessibleInputs) -> String {
        let query = self
            .input_values
            .get(QUERY_KEY)
            .map(value_text)
            .unwrap_or_default();
        compose_agent_prompt(&query, &self.input_values, access)
    }

    pub fn resume_with(self, decision: ResumeDecision) -> ResumeRequest {
        ResumeRequest {
            pipeline_id: self.pipeline_id,
            execution_id: self.execution_id,
            node_states: self.node_states,
            input_values: self.input_values,
            paused_node_id: self.node_id,
            decision,
            session_id: Some(self.session_id),
            model_name: Some(self.model_name),
            executor_messages: self.executor_messages,
            current_response: self.current_response,
            step_order_hint: Some(self.last_step_order),
            elapsed_before: Duration::from_millis(self.elapsed_ms),
        }
    }
}

/// A resume call: the paused run's state plus the reviewer's decision.
#[derive(Clone, Debug, PartialEq)]
pub struct ResumeRequest {
    pub pipeline_id: String,
    pub execution_id: String,
    pub node_states: NodeStates,
    pub input_values: InputValues,
    pub paused_node_id: String,
    pub decision: ResumeDecision,
    /// Defaults to the session recorded in the paused node's thread key.
    pub session_id: Option<String>,
    pub model_name: Option<String>,
    pub executor_messages: Vec<ExecutorMessage>,
    pub current_response: Option<Value>,
    /// Used when the run store cannot report the latest step order.
    pub step_order_hint: Option<u64>,
    pub elapsed_before: Duration,
}

impl ResumeRequest {
    /// The minimal resume call: ids, the yielded node states and input values, and the
    /// decision.
    pub fn new(
        pipeline_id: impl Into<String>,
        execution_id: impl Into<String>,
        node_states: NodeStates,
        input_values: InputValues,
        paused_node_id: impl Into<String>,
        decision: ResumeDecision,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            execution_id: execution_id.into(),
            node_states,
            input_values,
            paused_node_id: paused_node_id.into(),
            decision,
            session_id: None,
            model_name: None,
            executor_messages: Vec::new(),
            current_response: None,
            step_order_hint: None,
            elapsed_before: Duration::ZERO,
        }
    }

    /// Explicit session id, else the one inside the paused node's thread key.
    pub fn resolved_session_id(&self) -> Option<String> {
        self.session_id.clone().or_else(|| {
            self.node_states
                .get(&self.paused_node_id)
                .map(|s| s.thread.session_id.clone())
        })
    }

    /// The original query as seeded in `input_values`.
    pub fn original_query(&self) -> String {
        match self.input_values.get(QUERY_KEY) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// How a run (or resume) ended without error.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Completed {
        response: Value,
        executor_messages: Vec<ExecutorMessage>,
    },
    Suspended(Continuation),
}

impl RunOutcome {
    pub fn response(&self) -> Option<&Value> {
        match self {
            RunOutcome::Completed { response, .. } => Some(response),
            RunOutcome::Suspended(_) => None,
        }
    }

    pub fn continuation(&self) -> Option<&Continuation> {
        match self {
            RunOutcome::Suspended(c) => Some(c),
            RunOutcome::Completed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{NodeState, NodeStatus};
    use serde_json::json;

    fn paused_states() -> NodeStates {
        let mut states = NodeStates::new();
        states.insert(
            "a".to_string(),
            NodeState {
                thread: ThreadKey::new("sess-7", "exec-1", "a"),
                status: NodeStatus::PausedPlanReview,
                cached_output: None,
                approval_payload: Some(json!({"plan": "1. think"})),
            },
        );
        states
    }

    #[test]
    fn session_falls_back_to_thread_key() {
        let mut inputs = InputValues::new();
        inputs.insert(QUERY_KEY.to_string(), json!("hello"));
        let req = ResumeRequest::new("p", "exec-1", paused_states(), inputs, "a", ResumeDecision::Approved);
        assert_eq!(req.resolved_session_id().as_deref(), Some("sess-7"));
        assert_eq!(req.original_query(), "hello");
        assert_eq!(req.step_order_hint, None);
    }

    /// **Scenario**: A continuation survives JSON and converts into a full resume request.
    #[test]
    fn continuation_json_then_resume_request() {
        let c = Continuation {
            execution_id: "exec-1".into(),
            pipeline_id: "p".into(),
            session_id: "sess-7".into(),
            model_name: "mock".into(),
            node_id: "a".into(),
            node_name: "Planner".into(),
            agent_id: "planner".into(),
            thread: ThreadKey::new("sess-7", "exec-1", "a"),
            reason: PauseReason::PlanReview,
            payload: json!({"plan": "1. think"}),
            node_states: paused_states(),
            input_values: InputValues::new(),
            executor_messages: Vec::new(),
            current_response: None,
            last_step_order: 3,
            elapsed_ms: 40,
        };
        let text = serde_json::to_string(&c).unwrap();
        let back: Continuation = serde_json::from_str(&text).unwrap();
        assert_eq!(back, c);

        let req = back.resume_with(ResumeDecision::Rejected);
        assert_eq!(req.paused_node_id, "a");
        assert_eq!(req.step_order_hint, Some(3));
        assert_eq!(req.elapsed_before, Duration::from_millis(40));
        assert_eq!(req.decision, ResumeDecision::Rejected);
    }
}
