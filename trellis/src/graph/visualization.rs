//! Graph visualization utilities.
//!
//! Exports a [`GraphIndex`] to Graphviz DOT or a plain text listing for `trellis inspect`.

use std::fmt::Write;

use super::GraphIndex;
use crate::definition::NodeKind;

fn shape(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Input => "circle",
        NodeKind::Condition => "diamond",
        NodeKind::Output => "doublecircle",
        NodeKind::Agent | NodeKind::Other(_) => "box",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Generate Graphviz DOT format representation of the pipeline.
pub fn generate_dot(index: &GraphIndex) -> String {
    let mut dot = String::from("digraph {\n  rankdir=LR;\n");
    for node in index.nodes() {
        let _ = writeln!(
            dot,
            "  \"{}\" [label=\"{}\\n({})\", shape={}];",
            escape(&node.id),
            escape(node.display_name()),
            node.kind,
            shape(&node.kind)
        );
    }
    dot.push('\n');
    for node in index.nodes() {
        for edge in index.outgoing(&node.id) {
            match edge.condition.as_deref() {
                Some(cond) if !cond.is_empty() => {
                    let _ = writeln!(
                        dot,
                        "  \"{}\" -> \"{}\" [label=\"{}\"];",
                        escape(&node.id),
                        escape(&edge.target_id),
                        escape(cond)
                    );
                }
                _ => {
                    let _ = writeln!(
                        dot,
                        "  \"{}\" -> \"{}\";",
                        escape(&node.id),
                        escape(&edge.target_id)
                    );
                }
            }
        }
    }
    dot.push_str("}\n");
    dot
}

/// Generate a simple text representation of the pipeline structure.
pub fn generate_text(index: &GraphIndex) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Pipeline: {}", index.pipeline_id());
    let _ = writeln!(
        text,
        "Nodes: {}  Edges: {}",
        index.nodes().count(),
        index.edge_count()
    );
    for node in index.nodes() {
        let targets: Vec<&str> = index
            .outgoing(&node.id)
            .iter()
            .map(|e| e.target_id.as_str())
            .collect();
        if targets.is_empty() {
            let _ = writeln!(text, "  [{}] {} ({})", node.kind, node.id, node.display_name());
        } else {
            let _ = writeln!(
                text,
                "  [{}] {} ({}) -> {}",
                node.kind,
                node.id,
                node.display_name(),
                targets.join(", ")
            );
        }
    }
    text
}
