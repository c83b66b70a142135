//! Trellis CLI library: engine wiring, NDJSON event output and continuation files.
//!
//! The binary in `main.rs` parses arguments and calls into these helpers; tests drive them
//! with mock ports.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use trellis::{
    AccessibleInputs, ChatOpenAI, Continuation, DefinitionError, Engine, EngineConfig,
    EngineError, GraphIndex, InMemoryRunStore, LanguageModel, LanguageModelAgent, NodeConfig,
    PipelineDefinition, ProtocolEncoder, ResumeDecision, RunHandle, RunOutcome, RunStore,
    SqliteRunStore, StoreError, TraceMessage,
};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("pipeline: {0}")]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("run store: {0}")]
    Store(#[from] StoreError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid decision: {0}")]
    Decision(String),
}

/// Engine wired to an OpenAI-compatible model, a model-backed agent and a run store
/// (SQLite at `db`, in memory otherwise). The agent is returned so resumes can restore its
/// thread.
pub fn build_engine(
    config: EngineConfig,
    db: Option<&Path>,
) -> Result<(Engine, Arc<LanguageModelAgent>), CliError> {
    let llm: Arc<dyn LanguageModel> = Arc::new(ChatOpenAI::new(config.default_model.clone()));
    let agent = Arc::new(LanguageModelAgent::new(Arc::clone(&llm)));
    let store: Arc<dyn RunStore> = match db {
        Some(path) => Arc::new(SqliteRunStore::new(path)?),
        None => Arc::new(InMemoryRunStore::new()),
    };
    let engine = Engine::new(llm, agent.clone(), store).with_config(config);
    Ok((engine, agent))
}

/// Writes one JSON value as a line (or a pretty block) and flushes.
pub fn write_json_line<W: Write>(out: &mut W, value: &Value, pretty: bool) -> Result<(), CliError> {
    let s = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(out, "{}", s)?;
    out.flush()?;
    Ok(())
}

/// Streams every event of `handle` to `out` as protocol JSON, then returns the outcome.
pub async fn stream_events<W: Write>(
    mut handle: RunHandle,
    out: &mut W,
    pretty: bool,
) -> Result<RunOutcome, CliError> {
    let mut encoder = ProtocolEncoder::for_handle(&handle);
    while let Some(ev) = handle.next_event().await {
        let value = encoder.encode(&ev)?;
        write_json_line(out, &value, pretty)?;
    }
    Ok(handle.wait().await?)
}

/// `approved`, `rejected`, or `revised` with JSON `arguments`.
pub fn parse_decision(decision: &str, arguments: Option<&str>) -> Result<ResumeDecision, CliError> {
    if decision.trim().eq_ignore_ascii_case("revised") {
        let args = arguments
            .ok_or_else(|| CliError::Decision("revised needs --arguments <JSON>".to_string()))?;
        let value: Value = serde_json::from_str(args)
            .map_err(|e| CliError::Decision(format!("arguments are not JSON: {}", e)))?;
        return Ok(ResumeDecision::Revised(value));
    }
    decision.parse::<ResumeDecision>().map_err(CliError::Decision)
}

pub fn write_continuation(path: &Path, continuation: &Continuation) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(continuation)?;
    std::fs::write(path, format!("{}\n", text))?;
    Ok(())
}

pub fn read_continuation(path: &Path) -> Result<Continuation, CliError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Turns a fresh process should replay for the paused agent: the prompt it was dispatched
/// with (query plus the inputs its node may see in `definition`), then the plan or pending
/// tool calls it stopped on.
pub fn thread_seed(
    continuation: &Continuation,
    definition: &PipelineDefinition,
) -> Result<Vec<TraceMessage>, CliError> {
    let index = GraphIndex::build(definition)?;
    let access = match index.node(&continuation.node_id).map(|n| &n.config) {
        Some(NodeConfig::Agent(cfg)) => cfg.accessible_inputs.clone(),
        _ => AccessibleInputs::default(),
    };
    let pending = match continuation.payload.get("plan") {
        Some(Value::String(plan)) => TraceMessage::new("plan", plan.clone()),
        _ => TraceMessage::new(continuation.reason.as_str(), continuation.payload.to_string()),
    };
    Ok(vec![
        TraceMessage::new("user", continuation.agent_prompt(&access)),
        pending,
    ])
}
