//! Shared pipeline builders and run helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use trellis::{
    AgentPort, EdgeDefinition, Engine, EngineError, EngineEvent, EventSink, InMemoryRunStore,
    LanguageModel, NodeDefinition, NodeKind, PipelineDefinition, ResumeRequest, RunInput,
    RunOutcome, RunStore,
};

pub fn input(id: &str) -> NodeDefinition {
    NodeDefinition::new(id, NodeKind::Input, "Input")
}

pub fn agent(id: &str, name: &str, agent_id: &str) -> NodeDefinition {
    NodeDefinition::new(id, NodeKind::Agent, name).with_config(json!({ "agent_id": agent_id }))
}

pub fn agent_with(id: &str, name: &str, config: Value) -> NodeDefinition {
    NodeDefinition::new(id, NodeKind::Agent, name).with_config(config)
}

pub fn condition(id: &str, text: &str) -> NodeDefinition {
    NodeDefinition::new(id, NodeKind::Condition, "Check").with_config(json!({ "condition": text }))
}

pub fn output(id: &str) -> NodeDefinition {
    NodeDefinition::new(id, NodeKind::Output, "Output")
}

pub fn edge(source: &str, target: &str) -> EdgeDefinition {
    EdgeDefinition::new(source, target)
}

/// input -> agent `a` (agent id `answerer`) -> text output.
pub fn three_node_pipeline() -> PipelineDefinition {
    PipelineDefinition::new("three-node")
        .node(input("in"))
        .node(agent("a", "Answerer", "answerer"))
        .node(output("out"))
        .edge(edge("in", "a"))
        .edge(edge("a", "out"))
}

pub fn engine(
    llm: Arc<dyn LanguageModel>,
    agents: Arc<dyn AgentPort>,
    store: Arc<dyn RunStore>,
) -> Engine {
    Engine::new(llm, agents, store)
}

pub fn engine_with_memory(
    llm: Arc<dyn LanguageModel>,
    agents: Arc<dyn AgentPort>,
) -> (Engine, InMemoryRunStore) {
    let store = InMemoryRunStore::new();
    (engine(llm, agents, Arc::new(store.clone())), store)
}

/// Runs `engine.execute` with a buffered sink and returns every event plus the outcome.
pub async fn execute_collect(
    engine: &Engine,
    definition: &PipelineDefinition,
    input: RunInput,
) -> (Vec<EngineEvent>, Result<RunOutcome, EngineError>) {
    let (sink, mut rx) = EventSink::channel(512);
    let outcome = engine
        .execute(definition, input, &sink, &CancellationToken::new())
        .await;
    drop(sink);
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    (events, outcome)
}

pub async fn resume_collect(
    engine: &Engine,
    definition: &PipelineDefinition,
    request: ResumeRequest,
) -> (Vec<EngineEvent>, Result<RunOutcome, EngineError>) {
    let (sink, mut rx) = EventSink::channel(512);
    let outcome = engine
        .resume_in(definition, request, &sink, &CancellationToken::new())
        .await;
    drop(sink);
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    (events, outcome)
}

/// Compact `kind:node` labels for asserting event order.
pub fn labels(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .map(|ev| match ev {
            EngineEvent::Progress {
                node_id, status, ..
            } => format!("progress:{}:{}", node_id, status.as_str()),
            EngineEvent::Reasoning { node_id, .. } => format!("reasoning:{}", node_id),
            EngineEvent::Selected {
                source_id,
                target_id,
                ..
            } => format!("selected:{}->{}", source_id, target_id),
            EngineEvent::Suspended(c) => format!("suspended:{}", c.node_id),
            EngineEvent::Completed { .. } => "completed".to_string(),
            EngineEvent::Error { .. } => "error".to_string(),
        })
        .collect()
}
