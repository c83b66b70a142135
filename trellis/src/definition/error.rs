//! Pipeline definition error.
//!
//! Returned by `PipelineDefinition::from_json` and `GraphIndex::build` before any step runs.

use thiserror::Error;

/// A pipeline definition that cannot be executed.
///
/// Always fatal for the run: it is raised before the run record is created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The definition is not valid JSON or does not have the `{nodes, edges}` shape.
    #[error("cannot parse pipeline definition: {0}")]
    Parse(String),

    /// No node has type `input`.
    #[error("pipeline has no input node")]
    MissingInputNode,

    /// More than one node has type `input`.
    #[error("pipeline has more than one input node: {0:?}")]
    MultipleInputNodes(Vec<String>),

    /// Two nodes share the same id.
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(String),

    /// An edge references a node id that does not exist.
    #[error("edge {source_id} -> {target_id} references unknown node {missing}")]
    DanglingEdge {
        source_id: String,
        target_id: String,
        missing: String,
    },

    /// A node's `config` does not decode for its type.
    #[error("invalid config for node {node_id}: {reason}")]
    InvalidConfig { node_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display of DanglingEdge names both endpoints and the missing id.
    #[test]
    fn dangling_edge_display_names_endpoints() {
        let err = DefinitionError::DanglingEdge {
            source_id: "in".to_string(),
            target_id: "ghost".to_string(),
            missing: "ghost".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("in -> ghost"), "Display should show the edge: {}", s);
        assert!(s.ends_with("ghost"), "Display should end with missing id: {}", s);
    }

    /// **Scenario**: Display of MissingInputNode mentions the input node.
    #[test]
    fn missing_input_display() {
        let s = DefinitionError::MissingInputNode.to_string();
        assert!(s.contains("no input node"), "{}", s);
    }
}
