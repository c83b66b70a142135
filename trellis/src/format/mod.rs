//! Output formatting: coerce a run's final value into an output node's schema.

pub mod extract;
mod formatter;

pub use extract::{extract_json, Extraction};
pub use formatter::{build_format_prompt, ResponseFormatter};
