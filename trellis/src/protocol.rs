//! Wire protocol bridge.
//!
//! [`Envelope`] and [`EnvelopeState`] come from the `stream-event` crate; this module maps
//! [`EngineEvent`] onto [`ProtocolEvent`] and numbers events per stream.

pub use stream_event::{to_json as protocol_event_to_json, Envelope, EnvelopeState, ProtocolEvent};

use serde_json::Value;

use crate::agent::PauseReason;
use crate::engine::{EngineEvent, RunHandle};

/// Converts an `EngineEvent` into its wire event. Context-carrying variants serialize the
/// engine types to `Value`.
pub fn engine_event_to_protocol_event(
    ev: &EngineEvent,
) -> Result<ProtocolEvent, serde_json::Error> {
    let pe = match ev {
        EngineEvent::Progress {
            node_name, status, ..
        } => ProtocolEvent::Progress {
            node_name: node_name.clone(),
            status: status.as_str().to_string(),
        },
        EngineEvent::Reasoning { content, .. } => ProtocolEvent::Reasoning {
            content: content.clone(),
        },
        EngineEvent::Selected {
            source_id,
            target_id,
            target_name,
        } => ProtocolEvent::Selection {
            source_id: source_id.clone(),
            target_id: target_id.clone(),
            target_name: target_name.clone(),
        },
        EngineEvent::Suspended(c) => {
            let node_states = serde_json::to_value(&c.node_states)?;
            let input_values = serde_json::to_value(&c.input_values)?;
            let continuation = serde_json::to_value(c)?;
            match c.reason {
                PauseReason::PlanReview => ProtocolEvent::PlanVerificationRequired {
                    execution_id: c.execution_id.clone(),
                    node_id: c.node_id.clone(),
                    agent_id: c.agent_id.clone(),
                    pending_plan: c.payload.clone(),
                    node_states,
                    input_values,
                    continuation,
                },
                PauseReason::ToolReview => ProtocolEvent::ToolVerificationRequired {
                    execution_id: c.execution_id.clone(),
                    node_id: c.node_id.clone(),
                    agent_id: c.agent_id.clone(),
                    pending_tool_calls: c.payload.clone(),
                    node_states,
                    input_values,
                    continuation,
                },
            }
        }
        EngineEvent::Completed {
            response,
            executor_messages,
            elapsed_ms,
        } => ProtocolEvent::Completion {
            executor_messages: serde_json::to_value(executor_messages)?,
            response: response.clone(),
            elapsed_ms: *elapsed_ms,
        },
        EngineEvent::Error { message } => ProtocolEvent::Error {
            message: message.clone(),
        },
    };
    Ok(pe)
}

/// Serializes engine events of one stream with envelope fields and increasing `event_id`s.
pub struct ProtocolEncoder {
    state: EnvelopeState,
}

impl ProtocolEncoder {
    pub fn new(session_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self {
            state: EnvelopeState::new(session_id, execution_id),
        }
    }

    pub fn for_handle(handle: &RunHandle) -> Self {
        Self::new(handle.session_id(), handle.execution_id())
    }

    pub fn encode(&mut self, ev: &EngineEvent) -> Result<Value, serde_json::Error> {
        let pe = engine_event_to_protocol_event(ev)?;
        protocol_event_to_json(&pe, &mut self.state)
    }
}
