//! Lookup structures built once per run: node by id, node name by id, outgoing edges by source.

use std::collections::{HashMap, HashSet};

use crate::definition::{DefinitionError, NodeConfig, NodeKind, PipelineDefinition};

/// A node with its config already decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub config: NodeConfig,
}

impl IndexedNode {
    /// Name for progress events; falls back to the id when the definition left it blank.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// One outgoing edge, kept in edge-declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingEdge {
    pub target_id: String,
    pub condition: Option<String>,
}

/// Read-only index over a [`PipelineDefinition`].
///
/// Construction validates the graph: exactly one `input` node, unique node ids, every edge
/// endpoint known, every node config decodable. Nothing mutates the index afterwards.
///
/// **Interaction**: Built at the start of `Engine::execute` and `Engine::resume_in`; the walk
/// only reads it.
#[derive(Clone, Debug)]
pub struct GraphIndex {
    pipeline_id: String,
    /// Declaration order.
    nodes: Vec<IndexedNode>,
    position: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<OutgoingEdge>>,
    input_node: usize,
}

impl GraphIndex {
    pub fn build(definition: &PipelineDefinition) -> Result<Self, DefinitionError> {
        let mut nodes = Vec::with_capacity(definition.nodes.len());
        let mut position = HashMap::with_capacity(definition.nodes.len());
        let mut inputs = Vec::new();

        for node in &definition.nodes {
            if position.contains_key(&node.id) {
                return Err(DefinitionError::DuplicateNodeId(node.id.clone()));
            }
            let config = NodeConfig::decode(&node.kind, &node.config).map_err(|e| {
                DefinitionError::InvalidConfig {
                    node_id: node.id.clone(),
                    reason: e.to_string(),
                }
            })?;
            if node.kind == NodeKind::Input {
                inputs.push(nodes.len());
            }
            position.insert(node.id.clone(), nodes.len());
            nodes.push(IndexedNode {
                id: node.id.clone(),
                name: node.name.clone(),
                kind: node.kind.clone(),
                config,
            });
        }

        let input_node = match inputs.as_slice() {
            [] => return Err(DefinitionError::MissingInputNode),
            [only] => *only,
            many => {
                return Err(DefinitionError::MultipleInputNodes(
                    many.iter().map(|&i| nodes[i].id.clone()).collect(),
                ))
            }
        };

        let mut outgoing: HashMap<String, Vec<OutgoingEdge>> = HashMap::new();
        let mut seen = HashSet::new();
        for edge in &definition.edges {
            for endpoint in [&edge.source_id, &edge.target_id] {
                if !position.contains_key(endpoint) {
                    return Err(DefinitionError::DanglingEdge {
                        source_id: edge.source_id.clone(),
                        target_id: edge.target_id.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            // Duplicate edges would only add a second identical candidate.
            if !seen.insert((edge.source_id.as_str(), edge.target_id.as_str())) {
                continue;
            }
            outgoing
                .entry(edge.source_id.clone())
                .or_default()
                .push(OutgoingEdge {
                    target_id: edge.target_id.clone(),
                    condition: edge.condition.clone(),
                });
        }

        Ok(Self {
            pipeline_id: definition.id.clone(),
            nodes,
            position,
            outgoing,
            input_node,
        })
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn input_node(&self) -> &IndexedNode {
        &self.nodes[self.input_node]
    }

    pub fn node(&self, id: &str) -> Option<&IndexedNode> {
        self.position.get(id).map(|&i| &self.nodes[i])
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.node(id).map(IndexedNode::display_name)
    }

    /// Outgoing edges of `id` in declaration order; empty when there are none.
    pub fn outgoing(&self, id: &str) -> &[OutgoingEdge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &IndexedNode> {
        self.nodes.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{EdgeDefinition, NodeDefinition};
    use serde_json::json;

    fn branching() -> PipelineDefinition {
        PipelineDefinition::new("p1")
            .node(NodeDefinition::new("in", NodeKind::Input, "Input"))
            .node(
                NodeDefinition::new("c", NodeKind::Condition, "Check")
                    .with_config(json!({"condition": "is it about math?"})),
            )
            .node(NodeDefinition::new("a", NodeKind::Agent, "A").with_config(json!({"agent_id": "x"})))
            .node(NodeDefinition::new("b", NodeKind::Agent, "").with_config(json!({"agent_id": "y"})))
            .node(NodeDefinition::new("out", NodeKind::Output, "Out"))
            .edge(EdgeDefinition::new("in", "c"))
            .edge(EdgeDefinition::new("c", "b").with_condition("math"))
            .edge(EdgeDefinition::new("c", "a"))
            .edge(EdgeDefinition::new("a", "out"))
            .edge(EdgeDefinition::new("b", "out"))
    }

    /// **Scenario**: Outgoing edges keep declaration order; names fall back to ids.
    #[test]
    fn build_indexes_nodes_and_edges() {
        let index = GraphIndex::build(&branching()).unwrap();
        assert_eq!(index.pipeline_id(), "p1");
        assert_eq!(index.input_node().id, "in");
        let targets: Vec<_> = index.outgoing("c").iter().map(|e| e.target_id.as_str()).collect();
        assert_eq!(targets, vec!["b", "a"]);
        assert_eq!(index.outgoing("c")[0].condition.as_deref(), Some("math"));
        assert!(index.outgoing("out").is_empty());
        assert_eq!(index.name_of("a"), Some("A"));
        assert_eq!(index.name_of("b"), Some("b"));
        assert_eq!(index.edge_count(), 5);
        match &index.node("c").unwrap().config {
            NodeConfig::Condition(c) => assert_eq!(c.condition, "is it about math?"),
            other => panic!("expected condition config, got {:?}", other),
        }
    }

    /// **Scenario**: A definition without an input node fails with MissingInputNode.
    #[test]
    fn build_fails_without_input_node() {
        let def = PipelineDefinition::new("p")
            .node(NodeDefinition::new("out", NodeKind::Output, "Out"));
        match GraphIndex::build(&def) {
            Err(DefinitionError::MissingInputNode) => {}
            other => panic!("expected MissingInputNode, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn build_fails_with_two_input_nodes() {
        let def = PipelineDefinition::new("p")
            .node(NodeDefinition::new("i1", NodeKind::Input, "One"))
            .node(NodeDefinition::new("i2", NodeKind::Input, "Two"));
        match GraphIndex::build(&def) {
            Err(DefinitionError::MultipleInputNodes(ids)) => assert_eq!(ids, vec!["i1", "i2"]),
            other => panic!("expected MultipleInputNodes, got {:?}", other.map(|_| ())),
        }
    }

    /// **Scenario**: An edge whose target is not a node fails with DanglingEdge.
    #[test]
    fn build_fails_on_dangling_target() {
        let def = PipelineDefinition::new("p")
            .node(NodeDefinition::new("in", NodeKind::Input, "Input"))
            .edge(EdgeDefinition::new("in", "ghost"));
        match GraphIndex::build(&def) {
            Err(DefinitionError::DanglingEdge { missing, .. }) => assert_eq!(missing, "ghost"),
            other => panic!("expected DanglingEdge, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn build_fails_on_duplicate_id() {
        let def = PipelineDefinition::new("p")
            .node(NodeDefinition::new("in", NodeKind::Input, "Input"))
            .node(NodeDefinition::new("in", NodeKind::Output, "Out"));
        assert!(matches!(
            GraphIndex::build(&def),
            Err(DefinitionError::DuplicateNodeId(id)) if id == "in"
        ));
    }

    #[test]
    fn build_fails_on_bad_agent_config() {
        let def = PipelineDefinition::new("p")
            .node(NodeDefinition::new("in", NodeKind::Input, "Input"))
            .node(NodeDefinition::new("a", NodeKind::Agent, "A").with_config(json!({"agent_id": []})));
        assert!(matches!(
            GraphIndex::build(&def),
            Err(DefinitionError::InvalidConfig { node_id, .. }) if node_id == "a"
        ));
    }

    #[test]
    fn duplicate_edges_collapse() {
        let def = PipelineDefinition::new("p")
            .node(NodeDefinition::new("in", NodeKind::Input, "Input"))
            .node(NodeDefinition::new("out", NodeKind::Output, "Out"))
            .edge(EdgeDefinition::new("in", "out"))
            .edge(EdgeDefinition::new("in", "out"));
        let index = GraphIndex::build(&def).unwrap();
        assert_eq!(index.outgoing("in").len(), 1);
    }
}
