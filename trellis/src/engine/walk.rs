//! The graph walk shared by fresh runs and resumes.
//!
//! One `Run` owns the execution context and the step counter for a single run segment.
//! Every model or agent call and every event send is raced against the cancellation token.
//! Audit writes are best-effort: failures are logged and the walk goes on.

use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::event::{EngineEvent, EventSink, ProgressStatus};
use super::logging::{
    log_audit_failure, log_empty_output, log_node_complete, log_node_start, log_passthrough,
    log_route, log_run_complete, log_run_error, log_run_suspended,
};
use super::{Continuation, Engine, RunOutcome};
use crate::agent::{AgentInput, AgentOutcome, AgentRequest, PauseSignal, VerifierFlags};
use crate::context::{ExecutionContext, ExecutorMessage, NodeStatus, ThreadKey};
use crate::definition::{AgentConfig, NodeConfig, OutputConfig};
use crate::error::{EngineError, GraphError};
use crate::graph::{GraphIndex, IndexedNode};
use crate::persistence::{RunStatus, RunStatusUpdate, StepRecord};
use crate::router::RouteCandidate;

/// Where a walk stopped.
pub(super) enum Walk {
    Completed(Value),
    Suspended(Continuation),
}

/// Result of one agent dispatch.
pub(super) enum AgentStep {
    Completed,
    Paused(Continuation),
}

pub(super) struct Run<'a> {
    engine: &'a Engine,
    index: &'a GraphIndex,
    events: &'a EventSink,
    cancel: &'a CancellationToken,
    ctx: ExecutionContext,
    /// Order of the last step the store accepted.
    last_step: u64,
    started: Instant,
    elapsed_before: Duration,
}

impl<'a> Run<'a> {
    pub(super) fn new(
        engine: &'a Engine,
        index: &'a GraphIndex,
        events: &'a EventSink,
        cancel: &'a CancellationToken,
        ctx: ExecutionContext,
        last_step: u64,
        elapsed_before: Duration,
    ) -> Self {
        Self {
            engine,
            index,
            events,
            cancel,
            ctx,
            last_step,
            started: Instant::now(),
            elapsed_before,
        }
    }

    fn execution_id(&self) -> &str {
        &self.ctx.execution_id
    }

    fn elapsed(&self) -> Duration {
        self.elapsed_before + self.started.elapsed()
    }

    async fn guarded<F: Future>(&self, fut: F) -> Result<F::Output, EngineError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            out = fut => Ok(out),
        }
    }

    pub(super) async fn set_status(&self, update: RunStatusUpdate) {
        if let Err(e) = self
            .engine
            .store
            .update_run_status(self.execution_id(), update)
            .await
        {
            log_audit_failure(self.execution_id(), "update_run_status", &e);
        }
    }

    /// Appends a step at the next order. The counter only moves when the store accepts
    /// the record, so recorded orders stay gapless.
    pub(super) async fn record_step(&mut self, node_id: &str, node_type: &str, payload: Value) {
        let order = self.last_step + 1;
        let step = StepRecord::new(order, node_id, node_type, payload);
        match self.engine.store.append_step(self.execution_id(), step).await {
            Ok(()) => self.last_step = order,
            Err(e) => log_audit_failure(self.execution_id(), "append_step", &e),
        }
    }

    /// Sends a non-terminal event; a reader that stopped reading holds the run here only
    /// until it is cancelled.
    async fn emit(&self, event: EngineEvent) -> Result<(), EngineError> {
        self.events
            .emit(event, self.cancel)
            .await
            .map_err(|_| EngineError::Cancelled)
    }

    async fn progress(&self, node: &IndexedNode, status: ProgressStatus) -> Result<(), EngineError> {
        self.emit(EngineEvent::Progress {
            node_id: node.id.clone(),
            node_name: node.display_name().to_string(),
            status,
        })
        .await
    }

    /// Walks from `current` until an output node completes the run or an agent pauses.
    pub(super) async fn walk_from(&mut self, mut current: String) -> Result<Walk, EngineError> {
        let index = self.index;
        let limit = self.engine.config.max_steps;

        for _ in 0..limit {
            let node = index
                .node(&current)
                .ok_or_else(|| GraphError::UnknownNode(current.clone()))?;
            let edges = index.outgoing(&node.id);
            if edges.is_empty() {
                return Err(GraphError::DeadEnd {
                    node_id: node.id.clone(),
                }
                .into());
            }

            let condition = match &node.config {
                NodeConfig::Condition(cfg) => {
                    self.progress(node, ProgressStatus::Evaluating).await?;
                    Some(cfg.condition.as_str())
                }
                _ => None,
            };

            let target_id = if edges.len() == 1 {
                edges[0].target_id.clone()
            } else {
                let candidates: Vec<RouteCandidate> = edges
                    .iter()
                    .map(|e| RouteCandidate {
                        id: e.target_id.clone(),
                        name: index.name_of(&e.target_id).unwrap_or(&e.target_id).to_string(),
                        condition: e.condition.clone(),
                    })
                    .collect();
                let response = self.ctx.response_text();
                let selection = self
                    .guarded(self.engine.router.select(
                        condition.unwrap_or_default(),
                        &candidates,
                        &response,
                        &self.ctx.original_query,
                    ))
                    .await?
                    .map_err(|source| EngineError::Routing {
                        node_id: node.id.clone(),
                        source,
                    })?;
                if let Some(content) = selection.reasoning {
                    self.emit(EngineEvent::Reasoning {
                        node_id: node.id.clone(),
                        content,
                    })
                    .await?;
                }
                self.emit(EngineEvent::Selected {
                    source_id: node.id.clone(),
                    target_id: selection.target_id.clone(),
                    target_name: index
                        .name_of(&selection.target_id)
                        .unwrap_or(&selection.target_id)
                        .to_string(),
                })
                .await?;
                selection.target_id
            };

            if condition.is_some() {
                self.progress(node, ProgressStatus::Completed).await?;
            }
            log_route(self.execution_id(), &node.id, &target_id, edges.len());

            let target = index
                .node(&target_id)
                .ok_or_else(|| GraphError::UnknownNode(target_id.clone()))?;
            match &target.config {
                NodeConfig::Output(cfg) => {
                    let response = self.finish_output(target, cfg).await?;
                    return Ok(Walk::Completed(response));
                }
                NodeConfig::Agent(cfg) => {
                    let prompt = self.ctx.agent_prompt(&cfg.accessible_inputs);
                    if let AgentStep::Paused(c) =
                        self.dispatch_agent(target, cfg, AgentInput::Query { prompt }).await?
                    {
                        return Ok(Walk::Suspended(c));
                    }
                }
                NodeConfig::Condition(_) | NodeConfig::Input => {}
                NodeConfig::Passthrough { kind } => {
                    log_passthrough(self.execution_id(), &target.id, kind);
                }
            }
            current = target_id;
        }

        Err(GraphError::StepLimitExceeded { limit }.into())
    }

    /// Invokes the agent behind `target` and records its completion or pause.
    pub(super) async fn dispatch_agent(
        &mut self,
        target: &IndexedNode,
        cfg: &AgentConfig,
        input: AgentInput,
    ) -> Result<AgentStep, EngineError> {
        let node_id = target.id.as_str();
        log_node_start(self.execution_id(), node_id, "agent");
        self.progress(target, ProgressStatus::Started).await?;

        let thread = self.ctx.thread_for(node_id);
        self.ctx.set_status(node_id, NodeStatus::Running);
        let request = AgentRequest {
            agent_id: cfg.agent_id.clone(),
            input: input.clone(),
            thread: thread.clone(),
            verifiers: VerifierFlags {
                plan_review: cfg.plan_verifier,
                tool_review: cfg.tool_verifier,
            },
        };
        let response = self
            .guarded(self.engine.agents.invoke(request))
            .await?
            .map_err(|source| EngineError::Agent {
                node_id: node_id.to_string(),
                source,
            })?;

        match response.outcome {
            AgentOutcome::Completed { final_text } => {
                let (text, empty) = match final_text {
                    Some(t) if !t.trim().is_empty() => (t, false),
                    _ => {
                        log_empty_output(self.execution_id(), node_id, &cfg.agent_id);
                        (String::new(), true)
                    }
                };
                self.ctx.record_output(node_id, &text);
                self.ctx.executor_messages.push(ExecutorMessage {
                    node_id: node_id.to_string(),
                    node_name: target.display_name().to_string(),
                    agent_id: cfg.agent_id.clone(),
                    content: text.clone(),
                    trace: response.trace.clone(),
                });
                self.record_step(
                    node_id,
                    "agent",
                    json!({
                        "agent_id": cfg.agent_id,
                        "thread_id": thread.to_string(),
                        "input": input,
                        "output": text,
                        "empty_output": empty,
                        "trace": response.trace,
                    }),
                )
                .await;
                log_node_complete(self.execution_id(), node_id, "agent");
                self.progress(target, ProgressStatus::Completed).await?;
                Ok(AgentStep::Completed)
            }
            AgentOutcome::Paused(signal) => {
                self.ctx.record_pause(node_id, &signal);
                self.record_step(
                    node_id,
                    "agent",
                    json!({
                        "agent_id": cfg.agent_id,
                        "thread_id": thread.to_string(),
                        "input": input,
                        "paused": signal.reason,
                        "approval_payload": signal.payload,
                        "trace": response.trace,
                    }),
                )
                .await;
                log_run_suspended(self.execution_id(), node_id, signal.reason.as_str());
                Ok(AgentStep::Paused(self.continuation(target, cfg, signal)))
            }
        }
    }

    async fn finish_output(
        &mut self,
        target: &IndexedNode,
        cfg: &OutputConfig,
    ) -> Result<Value, EngineError> {
        log_node_start(self.execution_id(), &target.id, "output");
        self.progress(target, ProgressStatus::Started).await?;
        let raw = self.ctx.final_value();
        let formatted = self
            .guarded(self.engine.formatter.format(&raw, &cfg.output_schema))
            .await?;
        self.record_step(
            &target.id,
            "output",
            json!({
                "output_schema": cfg.output_schema,
                "input": raw,
                "output": formatted,
            }),
        )
        .await;
        log_node_complete(self.execution_id(), &target.id, "output");
        self.progress(target, ProgressStatus::Completed).await?;
        Ok(formatted)
    }

    fn continuation(&self, target: &IndexedNode, cfg: &AgentConfig, signal: PauseSignal) -> Continuation {
        let thread = self
            .ctx
            .node_states
            .get(&target.id)
            .map(|s| s.thread.clone())
            .unwrap_or_else(|| {
                ThreadKey::new(
                    self.ctx.session_id.as_str(),
                    self.ctx.execution_id.as_str(),
                    target.id.as_str(),
                )
            });
        Continuation {
            execution_id: self.ctx.execution_id.clone(),
            pipeline_id: self.ctx.pipeline_id.clone(),
            session_id: self.ctx.session_id.clone(),
            model_name: self.ctx.model_name.clone(),
            node_id: target.id.clone(),
            node_name: target.display_name().to_string(),
            agent_id: cfg.agent_id.clone(),
            thread,
            reason: signal.reason,
            payload: signal.payload,
            node_states: self.ctx.node_states.clone(),
            input_values: self.ctx.input_values.clone(),
            executor_messages: self.ctx.executor_messages.clone(),
            current_response: self.ctx.current_response.clone(),
            last_step_order: self.last_step,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    /// Records the run's terminal state and emits the closing event. The closing event never
    /// waits on a full buffer once the run is cancelled.
    pub(super) async fn finish(
        self,
        result: Result<Walk, EngineError>,
    ) -> Result<RunOutcome, EngineError> {
        match result {
            Ok(Walk::Completed(response)) => {
                let elapsed = self.elapsed();
                self.set_status(RunStatusUpdate::completed(response.clone(), elapsed))
                    .await;
                let elapsed_ms = elapsed.as_millis() as u64;
                log_run_complete(self.execution_id(), elapsed_ms);
                self.engine.agents.end_execution(self.execution_id());
                let executor_messages = self.ctx.executor_messages;
                self.events
                    .emit_terminal(
                        EngineEvent::Completed {
                            response: response.clone(),
                            executor_messages: executor_messages.clone(),
                            elapsed_ms,
                        },
                        self.cancel,
                    )
                    .await;
                Ok(RunOutcome::Completed {
                    response,
                    executor_messages,
                })
            }
            Ok(Walk::Suspended(continuation)) => {
                self.events
                    .emit_terminal(EngineEvent::Suspended(continuation.clone()), self.cancel)
                    .await;
                Ok(RunOutcome::Suspended(continuation))
            }
            Err(e) => {
                self.set_status(RunStatusUpdate::status(RunStatus::Interrupted))
                    .await;
                log_run_error(self.execution_id(), &e);
                self.engine.agents.end_execution(self.execution_id());
                self.events
                    .emit_terminal(
                        EngineEvent::Error {
                            message: e.to_string(),
                        },
                        self.cancel,
                    )
                    .await;
                Err(e)
            }
        }
    }
}
