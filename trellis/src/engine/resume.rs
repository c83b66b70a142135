//! Resuming a paused run: `Engine::resume_in` and its spawned variant `Engine::resume`.

use tokio_util::sync::CancellationToken;

use super::event::{EngineEvent, EventSink};
use super::handle::RunHandle;
use super::logging::{log_audit_failure, log_run_error, log_run_start};
use super::walk::{AgentStep, Run, Walk};
use super::{Engine, ResumeRequest, RunOutcome};
use crate::agent::{AgentInput, PauseReason};
use crate::context::{ExecutionContext, PauseInfo};
use crate::definition::{AgentConfig, NodeConfig, PipelineDefinition};
use crate::error::EngineError;
use crate::graph::{GraphIndex, IndexedNode};
use crate::persistence::{RunStatus, RunStatusUpdate};

/// Checks a resume request against the graph. No side effects.
fn validate<'i>(
    index: &'i GraphIndex,
    request: &ResumeRequest,
) -> Result<(&'i IndexedNode, &'i AgentConfig, PauseReason, String), EngineError> {
    let node_id = &request.paused_node_id;
    if !index.pipeline_id().is_empty()
        && !request.pipeline_id.is_empty()
        && index.pipeline_id() != request.pipeline_id
    {
        return Err(EngineError::InvalidResume(format!(
            "run belongs to pipeline {}, not {}",
            request.pipeline_id,
            index.pipeline_id()
        )));
    }
    let state = request.node_states.get(node_id).ok_or_else(|| {
        EngineError::InvalidResume(format!("node {} has no recorded state", node_id))
    })?;
    let reason = state.status.pause_reason().ok_or_else(|| {
        EngineError::InvalidResume(format!(
            "node {} is not paused (status {:?})",
            node_id, state.status
        ))
    })?;
    let node = index.node(node_id).ok_or_else(|| {
        EngineError::InvalidResume(format!("node {} is not part of the pipeline", node_id))
    })?;
    let NodeConfig::Agent(cfg) = &node.config else {
        return Err(EngineError::InvalidResume(format!(
            "node {} is not an agent node",
            node_id
        )));
    };
    if !request.decision.answers(reason) {
        return Err(EngineError::InvalidResume(format!(
            "decision {} does not answer a {} pause",
            request.decision,
            reason.as_str()
        )));
    }
    let session_id = request
        .resolved_session_id()
        .unwrap_or_else(|| state.thread.session_id.clone());
    Ok((node, cfg, reason, session_id))
}

impl Engine {
    /// Continues a run paused at an agent node with the reviewer's decision.
    ///
    /// The paused node is re-invoked with the decision on its original thread; the walk then
    /// continues from that node as in [`Engine::execute`]. A request whose node is not
    /// paused, or whose decision does not answer the pending review, fails with
    /// `InvalidResume` before any step is recorded. Step orders continue after the last
    /// recorded one.
    pub async fn resume_in(
        &self,
        definition: &PipelineDefinition,
        request: ResumeRequest,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let checked = GraphIndex::build(definition)
            .map_err(EngineError::from)
            .and_then(|index| {
                let (node, cfg, reason, session_id) = validate(&index, &request)?;
                let owned = (node.clone(), cfg.clone(), reason, session_id);
                Ok((index, owned))
            });
        let (index, (node, cfg, reason, session_id)) = match checked {
            Ok(v) => v,
            Err(e) => {
                log_run_error(&request.execution_id, &e);
                events
                    .emit_terminal(
                        EngineEvent::Error {
                            message: e.to_string(),
                        },
                        cancel,
                    )
                    .await;
                return Err(e);
            }
        };

        let execution_id = request.execution_id.clone();
        log_run_start(&execution_id, index.pipeline_id(), &session_id, true);

        let last_step = match self.store.latest_step_order(&execution_id).await {
            Ok(Some(order)) => order,
            Ok(None) => request.step_order_hint.unwrap_or(0),
            Err(e) => {
                log_audit_failure(&execution_id, "latest_step_order", &e);
                request.step_order_hint.unwrap_or(0)
            }
        };

        let original_query = request.original_query();
        let approval_payload = request
            .node_states
            .get(&node.id)
            .and_then(|s| s.approval_payload.clone())
            .unwrap_or_default();
        let ctx = ExecutionContext {
            execution_id,
            pipeline_id: index.pipeline_id().to_string(),
            session_id,
            model_name: request
                .model_name
                .unwrap_or_else(|| self.config.default_model.clone()),
            original_query,
            input_values: request.input_values,
            node_states: request.node_states,
            current_response: request.current_response,
            executor_messages: request.executor_messages,
            pause: Some(PauseInfo {
                node_id: node.id.clone(),
                reason,
                approval_payload,
            }),
        };

        let mut run = Run::new(
            self,
            &index,
            events,
            cancel,
            ctx,
            last_step,
            request.elapsed_before,
        );
        run.set_status(RunStatusUpdate::status(RunStatus::Running))
            .await;

        let input = AgentInput::Decision {
            reason,
            decision: request.decision,
        };
        let result = match run.dispatch_agent(&node, &cfg, input).await {
            Ok(AgentStep::Paused(c)) => Ok(Walk::Suspended(c)),
            Ok(AgentStep::Completed) => run.walk_from(node.id.clone()).await,
            Err(e) => Err(e),
        };
        run.finish(result).await
    }

    /// Spawns [`Engine::resume_in`]; see [`Engine::start`] for the handle and admission
    /// rules.
    pub fn resume(
        &self,
        definition: PipelineDefinition,
        request: ResumeRequest,
    ) -> Result<RunHandle, EngineError> {
        let session_id = request.resolved_session_id().ok_or_else(|| {
            EngineError::InvalidResume(format!(
                "node {} has no recorded state",
                request.paused_node_id
            ))
        })?;
        let execution_id = request.execution_id.clone();
        self.spawn_run(session_id, execution_id, move |engine, events, cancel| async move {
            engine.resume_in(&definition, request, &events, &cancel).await
        })
    }
}
