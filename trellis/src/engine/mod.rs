//! Pipeline engine: walks a [`PipelineDefinition`](crate::definition::PipelineDefinition)
//! from its input node, dispatching agents, routing branches and formatting the output.
//!
//! Two entry styles share one walk:
//! - [`Engine::execute`] / [`Engine::resume_in`] run in the caller's task and send events to
//!   an [`EventSink`].
//! - [`Engine::start`] / [`Engine::resume`] spawn the run and return a [`RunHandle`].

mod config;
mod continuation;
mod event;
mod handle;
pub mod logging;
mod resume;
mod run;
mod walk;

pub use config::EngineConfig;
pub use continuation::{Continuation, ResumeRequest, RunInput, RunOutcome};
pub use event::{EngineEvent, EventSink, ProgressStatus};
pub use handle::RunHandle;

use std::future::Future;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentPort;
use crate::error::EngineError;
use crate::format::ResponseFormatter;
use crate::llm::LanguageModel;
use crate::persistence::RunStore;
use crate::router::ConditionRouter;
use crate::session::SessionRegistry;

/// Executes pipelines against a language model, an agent port and a run store.
///
/// Cheap to clone; clones share the same ports and session registry. Holds no per-run
/// state, so one engine serves any number of concurrent runs.
///
/// **Interaction**: The CLI builds one per process with `ChatOpenAI`,
/// `LanguageModelAgent` and a run store; tests use `MockLanguageModel`, `ScriptedAgent`
/// and `InMemoryRunStore`.
#[derive(Clone)]
pub struct Engine {
    agents: Arc<dyn AgentPort>,
    store: Arc<dyn RunStore>,
    router: Arc<ConditionRouter>,
    formatter: Arc<ResponseFormatter>,
    config: EngineConfig,
    sessions: Option<Arc<SessionRegistry>>,
}

impl Engine {
    /// `llm` serves branch selection and output formatting; agents run behind `agents`.
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        agents: Arc<dyn AgentPort>,
        store: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            agents,
            store,
            router: Arc::new(ConditionRouter::new(Arc::clone(&llm))),
            formatter: Arc::new(ResponseFormatter::new(llm)),
            config: EngineConfig::default(),
            sessions: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables per-session admission control for spawned runs.
    pub fn with_sessions(mut self, sessions: Arc<SessionRegistry>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sessions(&self) -> Option<&Arc<SessionRegistry>> {
        self.sessions.as_ref()
    }

    /// Admits the session, then spawns `work` with a fresh event channel and cancel token.
    /// The session lease lives as long as the task.
    fn spawn_run<F, Fut>(
        &self,
        session_id: String,
        execution_id: String,
        work: F,
    ) -> Result<RunHandle, EngineError>
    where
        F: FnOnce(Engine, EventSink, CancellationToken) -> Fut,
        Fut: Future<Output = Result<RunOutcome, EngineError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let lease = match &self.sessions {
            Some(sessions) => Some(sessions.admit(&session_id, &execution_id, cancel.clone())?),
            None => None,
        };
        let (events, rx) = EventSink::channel(self.config.event_buffer);
        let fut = work(self.clone(), events, cancel.clone());
        let task = tokio::spawn(async move {
            let _lease = lease;
            fut.await
        });
        Ok(RunHandle::new(
            execution_id,
            session_id,
            cancel,
            ReceiverStream::new(rx),
            task,
        ))
    }
}
