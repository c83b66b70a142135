//! Engine error taxonomy.
//!
//! Every variant means "the run did not complete". Formatting never fails and audit-write
//! failures are logged and swallowed, so neither appears here.

use thiserror::Error;

use crate::agent::AgentError;
use crate::definition::DefinitionError;
use crate::llm::LlmError;

/// Graph shape problems found while walking.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node other than an output has no outgoing edge.
    #[error("node {node_id} has no outgoing edge")]
    DeadEnd { node_id: String },

    /// An edge led to a node id the index does not know.
    #[error("node {0} is not part of the pipeline")]
    UnknownNode(String),

    /// The walk exceeded the configured hop limit (likely a cycle).
    #[error("step limit of {limit} hops exceeded")]
    StepLimitExceeded { limit: usize },
}

/// Error returned by `Engine::execute`, `Engine::resume_in` and their spawned variants.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Model call failed during branch selection.
    #[error("routing at node {node_id} failed: {source}")]
    Routing {
        node_id: String,
        #[source]
        source: LlmError,
    },

    #[error("agent node {node_id} failed: {source}")]
    Agent {
        node_id: String,
        #[source]
        source: AgentError,
    },

    /// Resume requested against a node that is not paused (or with a mismatched decision).
    #[error("invalid resume: {0}")]
    InvalidResume(String),

    /// Admission control: the session already has a run in flight.
    #[error("session {0} already has a run in progress")]
    SessionConflict(String),

    #[error("run cancelled")]
    Cancelled,

    /// The spawned run task panicked or was aborted.
    #[error("run task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display of Routing names the node and the model failure.
    #[test]
    fn routing_error_display() {
        let err = EngineError::Routing {
            node_id: "cond-1".to_string(),
            source: LlmError::Request("503".to_string()),
        };
        let s = err.to_string();
        assert!(s.contains("cond-1"), "{}", s);
        assert!(s.contains("503"), "{}", s);
    }

    #[test]
    fn definition_error_is_transparent() {
        let err: EngineError = DefinitionError::MissingInputNode.into();
        assert_eq!(err.to_string(), DefinitionError::MissingInputNode.to_string());
    }

    #[test]
    fn graph_error_display() {
        let err: EngineError = GraphError::DeadEnd {
            node_id: "a".to_string(),
        }
        .into();
        assert!(err.to_string().contains("node a has no outgoing edge"));
    }
}
