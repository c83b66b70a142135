//! Events emitted while a run walks the graph.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Continuation;
use crate::context::ExecutorMessage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Started,
    /// A condition node is being evaluated.
    Evaluating,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Started => "started",
            ProgressStatus::Evaluating => "evaluating",
            ProgressStatus::Completed => "completed",
        }
    }
}

/// One item of a run's event stream.
///
/// A stream ends with exactly one of `Suspended`, `Completed` or `Error`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    Progress {
        node_id: String,
        node_name: String,
        status: ProgressStatus,
    },
    /// Model reasoning returned while routing; precedes the matching `Selected`.
    Reasoning { node_id: String, content: String },
    Selected {
        source_id: String,
        target_id: String,
        target_name: String,
    },
    Suspended(Continuation),
    Completed {
        response: Value,
        executor_messages: Vec<ExecutorMessage>,
        elapsed_ms: u64,
    },
    Error { message: String },
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineEvent::Suspended(_) | EngineEvent::Completed { .. } | EngineEvent::Error { .. }
        )
    }
}

/// Where a run sends its events. A sink without a channel discards them.
///
/// Sends wait for buffer space but never past cancellation, so a reader that stops reading
/// cannot hold a cancelled run open. Once the receiver is gone, events are dropped and the
/// run keeps going.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<EngineEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn discard() -> Self {
        Self::default()
    }

    /// A sink plus the receiving end of a bounded channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends `event` once the buffer has room. If `cancel` fires first the event is handed
    /// back undelivered.
    pub async fn emit(
        &self,
        event: EngineEvent,
        cancel: &CancellationToken,
    ) -> Result<(), EngineEvent> {
        let Some(tx) = &self.tx else {
            return Ok(());
        };
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(event),
            permit = tx.reserve() => permit,
        };
        if let Ok(permit) = permit {
            permit.send(event);
        }
        Ok(())
    }

    /// Sends without waiting; the event is dropped when the buffer is full.
    pub fn try_emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }

    /// Sends a closing event. After cancellation it falls back to [`EventSink::try_emit`].
    pub async fn emit_terminal(&self, event: EngineEvent, cancel: &CancellationToken) {
        if let Err(event) = self.emit(event, cancel).await {
            self.try_emit(event);
        }
    }
}
