//! Graph index over a pipeline definition, plus DOT/text rendering for inspection.

mod index;
mod visualization;

pub use index::{GraphIndex, IndexedNode, OutgoingEdge};
pub use visualization::{generate_dot, generate_text};
