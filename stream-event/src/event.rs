//! Protocol-level event types (`event_type` + payload).
//! Context-carrying variants use `serde_json::Value`; the bridge in trellis serializes engine types into that.

use serde::Serialize;
use serde_json::Value;

/// Protocol event: wire shape for one run event.
/// The envelope (session_id, execution_id, event_id) is applied separately.
///
/// Note on naming:
/// - `node_name` in `progress` is the human-readable node name
/// - `node_id` in verification events is the paused node's graph id
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Progress {
        node_name: String,
        status: String,
    },
    Reasoning {
        content: String,
    },
    Selection {
        source_id: String,
        target_id: String,
        target_name: String,
    },
    PlanVerificationRequired {
        execution_id: String,
        node_id: String,
        agent_id: String,
        pending_plan: Value,
        node_states: Value,
        input_values: Value,
        continuation: Value,
    },
    ToolVerificationRequired {
        execution_id: String,
        node_id: String,
        agent_id: String,
        pending_tool_calls: Value,
        node_states: Value,
        input_values: Value,
        continuation: Value,
    },
    Completion {
        executor_messages: Value,
        response: Value,
        elapsed_ms: u64,
    },
    Error {
        message: String,
    },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (event_type + payload only; no envelope).
    ///
    /// Use crate-level [`crate::to_json`] when you need envelope fields injected.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Whether this event ends the stream it belongs to.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProtocolEvent::PlanVerificationRequired { .. }
                | ProtocolEvent::ToolVerificationRequired { .. }
                | ProtocolEvent::Completion { .. }
                | ProtocolEvent::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ProtocolEvent;
    use serde_json::json;

    #[test]
    fn progress_uses_event_type_tag() {
        let event = ProtocolEvent::Progress {
            node_name: "Researcher".to_string(),
            status: "started".to_string(),
        };
        let value = event.to_value().unwrap();

        assert_eq!(value["event_type"], "progress");
        assert_eq!(value["node_name"], "Researcher");
        assert_eq!(value["status"], "started");
        assert!(value.get("type").is_none());
    }

    #[test]
    fn plan_verification_keeps_payload_node_id() {
        let event = ProtocolEvent::PlanVerificationRequired {
            execution_id: "exec-1".to_string(),
            node_id: "agent-a".to_string(),
            agent_id: "planner".to_string(),
            pending_plan: json!({"plan": "1. look"}),
            node_states: json!({}),
            input_values: json!({"query": "q"}),
            continuation: json!(null),
        };
        let value = event.to_value().unwrap();

        assert_eq!(value["event_type"], "plan_verification_required");
        assert_eq!(value["node_id"], "agent-a");
        assert_eq!(value["pending_plan"]["plan"], "1. look");
        assert!(event.is_terminal());
    }

    #[test]
    fn reasoning_is_not_terminal() {
        let event = ProtocolEvent::Reasoning {
            content: "B fits".to_string(),
        };
        assert!(!event.is_terminal());
    }
}
