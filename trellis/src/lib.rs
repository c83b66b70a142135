//! # Trellis
//!
//! A pipeline execution engine. A pipeline is a directed graph of typed nodes (`input`,
//! `agent`, `condition`, `output`) that is walked one node at a time from its single input
//! node to an output node.
//!
//! ## Design principles
//!
//! - **One walk, one context**: each run owns an [`ExecutionContext`]; the engine is the
//!   only writer, so concurrent runs never share mutable state.
//! - **Model-routed branches**: when a node has several outgoing edges, one language-model
//!   call picks the target ([`ConditionRouter`]).
//! - **Human approval pauses**: an agent may stop for plan or tool review. The run then
//!   ends with a serializable [`Continuation`]; [`Engine::resume_in`] continues it on the
//!   same agent thread.
//! - **Best-effort audit**: every hop is recorded through a [`RunStore`]; store failures
//!   are logged and never fail the run.
//!
//! ## Main modules
//!
//! - [`definition`]: [`PipelineDefinition`], [`NodeDefinition`], [`EdgeDefinition`], typed
//!   node configs ([`NodeConfig`]).
//! - [`graph`]: [`GraphIndex`] built once per run; [`generate_dot`], [`generate_text`].
//! - [`engine`]: [`Engine`], [`RunInput`], [`RunOutcome`], [`EngineEvent`], [`RunHandle`].
//! - [`agent`]: [`AgentPort`] plus [`ScriptedAgent`] and [`LanguageModelAgent`].
//! - [`llm`]: [`LanguageModel`] plus [`MockLanguageModel`] and [`ChatOpenAI`].
//! - [`persistence`]: [`RunStore`], [`InMemoryRunStore`], [`SqliteRunStore`].
//! - [`router`], [`format`]: branch selection and output formatting.
//! - [`session`]: [`SessionRegistry`], one run in flight per session.
//! - [`protocol`]: [`EngineEvent`] to wire JSON via the `stream-event` crate.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trellis::{
//!     Engine, EventSink, InMemoryRunStore, MockLanguageModel, NodeDefinition, NodeKind,
//!     PipelineDefinition, EdgeDefinition, RunInput, ScriptedAgent,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let def = PipelineDefinition::new("p1")
//!     .node(NodeDefinition::new("in", NodeKind::Input, "Input"))
//!     .node(
//!         NodeDefinition::new("a", NodeKind::Agent, "Answerer")
//!             .with_config(serde_json::json!({"agent_id": "answerer"})),
//!     )
//!     .node(NodeDefinition::new("out", NodeKind::Output, "Output"))
//!     .edge(EdgeDefinition::new("in", "a"))
//!     .edge(EdgeDefinition::new("a", "out"));
//!
//! let engine = Engine::new(
//!     Arc::new(MockLanguageModel::with_reply("unused")),
//!     Arc::new(ScriptedAgent::new().reply("answerer", "42")),
//!     Arc::new(InMemoryRunStore::new()),
//! );
//! let outcome = engine
//!     .execute(&def, RunInput::new("s1", "what is 6*7?"), &EventSink::discard(), &CancellationToken::new())
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.response(), Some(&serde_json::json!("42")));
//! # }
//! ```

pub mod agent;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod format;
pub mod graph;
pub mod llm;
pub mod persistence;
pub mod protocol;
pub mod router;
pub mod session;

pub use agent::{
    AgentError, AgentInput, AgentOutcome, AgentPort, AgentRequest, AgentResponse,
    LanguageModelAgent, PauseReason, PauseSignal, ResumeDecision, ScriptedAgent, TraceMessage,
    VerifierFlags,
};
pub use context::{
    ExecutionContext, ExecutorMessage, InputValues, NodeState, NodeStates, NodeStatus,
    PauseInfo, ThreadKey, QUERY_KEY,
};
pub use definition::{
    AccessibleInputs, AgentConfig, ConditionConfig, DefinitionError, EdgeDefinition, NodeConfig,
    NodeDefinition, NodeKind, OutputConfig, PipelineDefinition,
};
pub use engine::{
    Continuation, Engine, EngineConfig, EngineEvent, EventSink, ProgressStatus, ResumeRequest,
    RunHandle, RunInput, RunOutcome,
};
pub use error::{EngineError, GraphError};
pub use format::{extract_json, Extraction, ResponseFormatter};
pub use graph::{generate_dot, generate_text, GraphIndex, IndexedNode};
pub use llm::{ChatOpenAI, LanguageModel, LlmError, MockLanguageModel};
pub use persistence::{
    InMemoryRunStore, NewRun, RunRecord, RunStatus, RunStatusUpdate, RunStore, SqliteRunStore,
    StepRecord, StoreError,
};
pub use protocol::{engine_event_to_protocol_event, ProtocolEncoder, ProtocolEvent};
pub use router::{ConditionRouter, RouteCandidate, RouteSelection};
pub use session::{SessionLease, SessionRegistry};

/// When running `cargo test -p trellis`, initializes tracing from `RUST_LOG` so that unit
/// tests in `src/**` can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
