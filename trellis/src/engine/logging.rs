//! Logging utilities for pipeline runs.
//!
//! Structured `tracing` events for run lifecycle, node dispatch, routing and audit writes.

use crate::error::EngineError;
use crate::persistence::StoreError;

/// Log run start (fresh or resumed).
pub fn log_run_start(execution_id: &str, pipeline_id: &str, session_id: &str, resumed: bool) {
    tracing::info!(
        execution_id,
        pipeline_id,
        session_id,
        resumed,
        "Starting pipeline run"
    );
}

/// Log node dispatch start.
pub fn log_node_start(execution_id: &str, node_id: &str, node_type: &str) {
    tracing::debug!(execution_id, node_id, node_type, "Starting node");
}

/// Log node completion.
pub fn log_node_complete(execution_id: &str, node_id: &str, node_type: &str) {
    tracing::debug!(execution_id, node_id, node_type, "Node complete");
}

/// Log an edge taken out of `source_id`.
pub fn log_route(execution_id: &str, source_id: &str, target_id: &str, candidates: usize) {
    tracing::debug!(execution_id, source_id, target_id, candidates, "Edge selected");
}

/// Log an unrecognized node type passed through.
pub fn log_passthrough(execution_id: &str, node_id: &str, node_type: &str) {
    tracing::warn!(execution_id, node_id, node_type, "Unknown node type, passing through");
}

/// Log an agent that finished without output.
pub fn log_empty_output(execution_id: &str, node_id: &str, agent_id: &str) {
    tracing::warn!(execution_id, node_id, agent_id, "Agent finished without output");
}

/// Log a suspension for human review.
pub fn log_run_suspended(execution_id: &str, node_id: &str, reason: &str) {
    tracing::info!(execution_id, node_id, reason, "Run suspended for review");
}

/// Log run completion.
pub fn log_run_complete(execution_id: &str, elapsed_ms: u64) {
    tracing::info!(execution_id, elapsed_ms, "Pipeline run complete");
}

/// Log run failure.
pub fn log_run_error(execution_id: &str, error: &EngineError) {
    tracing::error!(execution_id, %error, "Pipeline run failed");
}

/// Log an audit write that failed and was ignored.
pub fn log_audit_failure(execution_id: &str, operation: &str, error: &StoreError) {
    tracing::warn!(execution_id, operation, %error, "Run store write failed, continuing");
}
