//! Fresh runs: `Engine::execute` and its spawned variant `Engine::start`.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::event::{EngineEvent, EventSink};
use super::handle::RunHandle;
use super::logging::{log_audit_failure, log_run_error, log_run_start};
use super::walk::Run;
use super::{Engine, RunInput, RunOutcome};
use crate::context::ExecutionContext;
use crate::definition::PipelineDefinition;
use crate::error::EngineError;
use crate::graph::GraphIndex;
use crate::persistence::{NewRun, RunStatus, RunStatusUpdate};

impl Engine {
    /// Runs `definition` from its input node until an output node completes it or an agent
    /// pauses it.
    ///
    /// Events go to `events` in order and end with one terminal event. An invalid definition
    /// fails before any step is recorded. Cancelling `cancel` stops the run at its next
    /// model or agent call and marks it `INTERRUPTED`.
    pub async fn execute(
        &self,
        definition: &PipelineDefinition,
        input: RunInput,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let index = match GraphIndex::build(definition) {
            Ok(index) => index,
            Err(e) => {
                let e = EngineError::from(e);
                let execution_id = input.execution_id.as_deref().unwrap_or_default();
                log_run_error(execution_id, &e);
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

        let execution_id = input
            .execution_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let model_name = input
            .model_name
            .unwrap_or_else(|| self.config.default_model.clone());
        let pipeline_id = index.pipeline_id().to_string();
        log_run_start(&execution_id, &pipeline_id, &input.session_id, false);

        let new_run = NewRun {
            execution_id: execution_id.clone(),
            pipeline_id: pipeline_id.clone(),
            session_id: input.session_id.clone(),
            model_name: model_name.clone(),
            query: input.query.clone(),
        };
        if let Err(e) = self.store.create_run(&new_run).await {
            log_audit_failure(&execution_id, "create_run", &e);
        }

        let ctx = ExecutionContext::new(
            execution_id,
            pipeline_id,
            input.session_id,
            model_name,
            input.query,
        );
        let mut run = Run::new(self, &index, events, cancel, ctx, 0, Duration::ZERO);
        let input_node = index.input_node();
        run.record_step(&input_node.id, "input", json!({ "query": new_run.query }))
            .await;
        run.set_status(RunStatusUpdate::status(RunStatus::Running))
            .await;

        let result = run.walk_from(input_node.id.clone()).await;
        run.finish(result).await
    }

    /// Spawns [`Engine::execute`] on the tokio runtime and returns a handle carrying the
    /// event stream, a cancel switch and the final outcome.
    ///
    /// With a session registry attached, a second run for a session that already has one in
    /// flight is refused with `SessionConflict` before anything is spawned.
    pub fn start(
        &self,
        definition: PipelineDefinition,
        input: RunInput,
    ) -> Result<RunHandle, EngineError> {
        let execution_id = input
            .execution_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session_id = input.session_id.clone();
        let input = input.with_execution_id(execution_id.clone());
        self.spawn_run(session_id, execution_id, move |engine, events, cancel| async move {
            engine.execute(&definition, input, &events, &cancel).await
        })
    }
}
