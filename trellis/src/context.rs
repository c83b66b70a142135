//! Per-run execution context: accumulated inputs, per-node state, pause metadata.
//!
//! Owned by exactly one run; the engine is the only writer. A snapshot of `input_values`
//! and `node_states` travels in a `Continuation` when the run pauses.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{PauseReason, PauseSignal, TraceMessage};
use crate::definition::AccessibleInputs;

/// Key under which the original query is seeded into `input_values`.
pub const QUERY_KEY: &str = "query";

pub type InputValues = BTreeMap<String, Value>;
pub type NodeStates = BTreeMap<String, NodeState>;

/// Conversation thread of one node within one run of one session.
///
/// Compared and hashed field by field. [`fmt::Display`] length-prefixes every part, so ids
/// containing separator characters cannot collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadKey {
    pub session_id: String,
    pub execution_id: String,
    pub node_id: String,
}

impl ThreadKey {
    pub fn new(
        session_id: impl Into<String>,
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            execution_id: execution_id.into(),
            node_id: node_id.into(),
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{},{}:{},{}:{}",
            self.session_id.len(),
            self.session_id,
            self.execution_id.len(),
            self.execution_id,
            self.node_id.len(),
            self.node_id
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    NotStarted,
    Running,
    PausedPlanReview,
    PausedToolReview,
    Completed,
}

impl NodeStatus {
    pub fn paused(reason: PauseReason) -> Self {
        match reason {
            PauseReason::PlanReview => NodeStatus::PausedPlanReview,
            PauseReason::ToolReview => NodeStatus::PausedToolReview,
        }
    }

    /// The pending review when this status is a paused one.
    pub fn pause_reason(&self) -> Option<PauseReason> {
        match self {
            NodeStatus::PausedPlanReview => Some(PauseReason::PlanReview),
            NodeStatus::PausedToolReview => Some(PauseReason::ToolReview),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub thread: ThreadKey,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_payload: Option<Value>,
}

/// Set while the run is suspended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PauseInfo {
    pub node_id: String,
    pub reason: PauseReason,
    pub approval_payload: Value,
}

/// What one completed agent dispatch contributed to the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutorMessage {
    pub node_id: String,
    pub node_name: String,
    pub agent_id: String,
    pub content: String,
    #[serde(default)]
    pub trace: Vec<TraceMessage>,
}

#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub pipeline_id: String,
    pub session_id: String,
    pub model_name: String,
    pub original_query: String,
    pub input_values: InputValues,
    pub node_states: NodeStates,
    /// Latest agent output; `None` until an agent completes.
    pub current_response: Option<Value>,
    pub executor_messages: Vec<ExecutorMessage>,
    pub pause: Option<PauseInfo>,
}

impl ExecutionContext {
    pub fn new(
        execution_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        session_id: impl Into<String>,
        model_name: impl Into<String>,
        original_query: impl Into<String>,
    ) -> Self {
        let original_query = original_query.into();
        let mut input_values = InputValues::new();
        input_values.insert(QUERY_KEY.to_string(), Value::String(original_query.clone()));
        Self {
            execution_id: execution_id.into(),
            pipeline_id: pipeline_id.into(),
            session_id: session_id.into(),
            model_name: model_name.into(),
            original_query,
            input_values,
            node_states: NodeStates::new(),
            current_response: None,
            executor_messages: Vec::new(),
            pause: None,
        }
    }

    /// Thread key for `node_id`, creating a `not_started` entry on first visit. Later
    /// visits get the same key back.
    pub fn thread_for(&mut self, node_id: &str) -> ThreadKey {
        let (session_id, execution_id) = (&self.session_id, &self.execution_id);
        self.node_states
            .entry(node_id.to_string())
            .or_insert_with(|| NodeState {
                thread: ThreadKey::new(session_id.as_str(), execution_id.as_str(), node_id),
                status: NodeStatus::NotStarted,
                cached_output: None,
                approval_payload: None,
            })
            .thread
            .clone()
    }

    pub fn set_status(&mut self, node_id: &str, status: NodeStatus) {
        if let Some(state) = self.node_states.get_mut(node_id) {
            state.status = status;
        }
    }

    /// Input values the node may see.
    pub fn visible_inputs(&self, access: &AccessibleInputs) -> InputValues {
        visible_inputs(&self.input_values, access)
    }

    /// Original query followed by the visible input pairs (the seeded query itself is not
    /// repeated).
    pub fn agent_prompt(&self, access: &AccessibleInputs) -> String {
        compose_agent_prompt(&self.original_query, &self.input_values, access)
    }

    /// Stores a completed agent's text as the current response and under the node's id.
    pub fn record_output(&mut self, node_id: &str, text: &str) {
        let value = Value::String(text.to_string());
        self.current_response = Some(value.clone());
        self.input_values.insert(node_id.to_string(), value.clone());
        if let Some(state) = self.node_states.get_mut(node_id) {
            state.status = NodeStatus::Completed;
            state.cached_output = Some(value);
            state.approval_payload = None;
        }
        if self.pause.as_ref().is_some_and(|p| p.node_id == node_id) {
            self.pause = None;
        }
    }

    pub fn record_pause(&mut self, node_id: &str, signal: &PauseSignal) {
        if let Some(state) = self.node_states.get_mut(node_id) {
            state.status = NodeStatus::paused(signal.reason);
            state.approval_payload = Some(signal.payload.clone());
        }
        self.pause = Some(PauseInfo {
            node_id: node_id.to_string(),
            reason: signal.reason,
            approval_payload: signal.payload.clone(),
        });
    }

    /// Current response as routing text; empty before any agent ran.
    pub fn response_text(&self) -> String {
        self.current_response
            .as_ref()
            .map(value_text)
            .unwrap_or_default()
    }

    /// Value handed to the output formatter: the latest response, or the query when no
    /// agent ran.
    pub fn final_value(&self) -> Value {
        self.current_response
            .clone()
            .unwrap_or_else(|| Value::String(self.original_query.clone()))
    }
}

/// Strings render bare; anything else as compact JSON.
fn visible_inputs(input_values: &InputValues, access: &AccessibleInputs) -> InputValues {
    input_values
        .iter()
        .filter(|(k, _)| access.allows(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Prompt an agent node receives: `query`, then one `- key: value` line per input the node
/// may see, in key order.
pub(crate) fn compose_agent_prompt(
    query: &str,
    input_values: &InputValues,
    access: &AccessibleInputs,
) -> String {
    let visible = visible_inputs(input_values, access);
    let mut prompt = query.to_string();
    let mut pairs = visible
        .iter()
        .filter(|(k, _)| k.as_str() != QUERY_KEY)
        .peekable();
    if pairs.peek().is_some() {
        prompt.push_str("\n\nInputs:");
        for (key, value) in pairs {
            prompt.push_str("\n- ");
            prompt.push_str(key);
            prompt.push_str(": ");
            prompt.push_str(&value_text(value));
        }
    }
    prompt
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("exec-1", "pipe-1", "sess-1", "mock", "What is 6 x 7?")
    }

    #[test]
    fn new_seeds_query() {
        let c = ctx();
        assert_eq!(c.input_values.get(QUERY_KEY), Some(&json!("What is 6 x 7?")));
        assert_eq!(c.final_value(), json!("What is 6 x 7?"));
        assert_eq!(c.response_text(), "");
    }

    /// **Scenario**: Separator characters inside ids cannot make two keys render the same.
    #[test]
    fn thread_key_display_is_collision_free() {
        let a = ThreadKey::new("a,1:b", "c", "d");
        let b = ThreadKey::new("a", "1:b,c", "d");
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(ThreadKey::new("s", "ex", "n").to_string(), "1:s,2:ex,1:n");
    }

    #[test]
    fn thread_for_is_stable_across_visits() {
        let mut c = ctx();
        let first = c.thread_for("agent-a");
        c.set_status("agent-a", NodeStatus::Completed);
        let second = c.thread_for("agent-a");
        assert_eq!(first, second);
        assert_eq!(first, ThreadKey::new("sess-1", "exec-1", "agent-a"));
        assert_eq!(c.node_states["agent-a"].status, NodeStatus::Completed);
    }

    /// **Scenario**: input_keys ["a"] never exposes "b"; ["all"] exposes every key.
    #[test]
    fn visibility_filters_keys() {
        let mut c = ctx();
        c.input_values.insert("a".into(), json!("alpha"));
        c.input_values.insert("b".into(), json!("beta"));

        let only_a = c.visible_inputs(&AccessibleInputs::only(["a"]));
        assert_eq!(only_a.keys().collect::<Vec<_>>(), vec!["a"]);

        let all = c.visible_inputs(&AccessibleInputs::default());
        assert_eq!(all.len(), 3);

        let prompt = c.agent_prompt(&AccessibleInputs::only(["a"]));
        assert!(prompt.starts_with("What is 6 x 7?"));
        assert!(prompt.contains("- a: alpha"));
        assert!(!prompt.contains("beta"));
    }

    #[test]
    fn prompt_without_visible_pairs_is_the_query() {
        let c = ctx();
        assert_eq!(c.agent_prompt(&AccessibleInputs::default()), "What is 6 x 7?");
    }

    #[test]
    fn record_output_and_pause() {
        let mut c = ctx();
        c.thread_for("n1");
        c.record_pause(
            "n1",
            &PauseSignal {
                reason: PauseReason::ToolReview,
                payload: json!([{"name": "rm"}]),
            },
        );
        assert_eq!(c.node_states["n1"].status, NodeStatus::PausedToolReview);
        assert_eq!(c.pause.as_ref().map(|p| p.reason), Some(PauseReason::ToolReview));

        c.record_output("n1", "42");
        assert_eq!(c.node_states["n1"].status, NodeStatus::Completed);
        assert_eq!(c.node_states["n1"].cached_output, Some(json!("42")));
        assert_eq!(c.node_states["n1"].approval_payload, None);
        assert_eq!(c.input_values["n1"], json!("42"));
        assert_eq!(c.response_text(), "42");
        assert!(c.pause.is_none());
    }

    #[test]
    fn node_status_serde_and_reason() {
        assert_eq!(
            serde_json::to_value(NodeStatus::PausedPlanReview).unwrap(),
            json!("paused_plan_review")
        );
        assert_eq!(NodeStatus::Running.pause_reason(), None);
        assert_eq!(
            NodeStatus::paused(PauseReason::PlanReview).pause_reason(),
            Some(PauseReason::PlanReview)
        );
    }
}
