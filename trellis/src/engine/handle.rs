//! Handle to a spawned run.

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::event::EngineEvent;
use super::RunOutcome;
use crate::error::EngineError;

/// A run executing on its own task.
///
/// **Interaction**: Returned by `Engine::start` and `Engine::resume`. Read events with
/// [`RunHandle::next_event`] or take the whole stream with [`RunHandle::take_events`];
/// [`RunHandle::wait`] returns the outcome. Dropping the event stream does not stop the run.
pub struct RunHandle {
    execution_id: String,
    session_id: String,
    cancel: CancellationToken,
    events: Option<ReceiverStream<EngineEvent>>,
    task: JoinHandle<Result<RunOutcome, EngineError>>,
}

impl RunHandle {
    pub(super) fn new(
        execution_id: String,
        session_id: String,
        cancel: CancellationToken,
        events: ReceiverStream<EngineEvent>,
        task: JoinHandle<Result<RunOutcome, EngineError>>,
    ) -> Self {
        Self {
            execution_id,
            session_id,
            cancel,
            events: Some(events),
            task,
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Requests cancellation; the run stops at its next model or agent call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the stream has ended or was taken.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        match self.events.as_mut() {
            Some(events) => events.next().await,
            None => None,
        }
    }

    pub fn take_events(&mut self) -> Option<ReceiverStream<EngineEvent>> {
        self.events.take()
    }

    /// Waits for the run to end. Events not yet read are discarded.
    pub async fn wait(mut self) -> Result<RunOutcome, EngineError> {
        drop(self.events.take());
        self.task
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?
    }

    /// Drains every remaining event, then waits for the outcome.
    pub async fn collect(mut self) -> (Vec<EngineEvent>, Result<RunOutcome, EngineError>) {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        let outcome = self.wait().await;
        (events, outcome)
    }
}
