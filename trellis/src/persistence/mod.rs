//! Persistence port for run and step records.
//!
//! The engine treats this as a write-mostly audit sink: it creates the run, appends one step
//! per graph hop, updates the run status, and reads back only the latest step order when
//! resuming. Failed writes are logged by the engine and never abort a run.

mod memory;
mod sqlite;

pub use memory::{InMemoryRunStore, RunRecord};
pub use sqlite::SqliteRunStore;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Interrupted => "INTERRUPTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Interrupted)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RunStatus::Pending),
            "RUNNING" => Ok(RunStatus::Running),
            "COMPLETED" => Ok(RunStatus::Completed),
            "INTERRUPTED" => Ok(RunStatus::Interrupted),
            other => Err(StoreError::Serialization(format!("unknown run status {}", other))),
        }
    }
}

/// Data for `create_run`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRun {
    pub execution_id: String,
    pub pipeline_id: String,
    pub session_id: String,
    pub model_name: String,
    pub query: String,
}

/// Data for `update_run_status`.
#[derive(Clone, Debug, PartialEq)]
pub struct RunStatusUpdate {
    pub status: RunStatus,
    pub final_value: Option<Value>,
    pub elapsed: Option<Duration>,
}

impl RunStatusUpdate {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status,
            final_value: None,
            elapsed: None,
        }
    }

    pub fn completed(final_value: Value, elapsed: Duration) -> Self {
        Self {
            status: RunStatus::Completed,
            final_value: Some(final_value),
            elapsed: Some(elapsed),
        }
    }
}

/// One graph hop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Strictly increasing and gapless within a run, starting at 1.
    pub order: u64,
    pub node_id: String,
    pub node_type: String,
    /// Input/output snapshot of the hop.
    pub payload: Value,
    pub recorded_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(order: u64, node_id: impl Into<String>, node_type: impl Into<String>, payload: Value) -> Self {
        Self {
            order,
            node_id: node_id.into(),
            node_type: node_type.into(),
            payload,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("run not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Run/step record store.
///
/// **Interaction**: Held as `Arc<dyn RunStore>` by `Engine`. `append_step` with an order that
/// is already recorded must be a no-op so callers can retry.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &NewRun) -> Result<(), StoreError>;

    async fn update_run_status(
        &self,
        execution_id: &str,
        update: RunStatusUpdate,
    ) -> Result<(), StoreError>;

    async fn append_step(&self, execution_id: &str, step: StepRecord) -> Result<(), StoreError>;

    /// Highest recorded step order, or `None` when the run has no steps.
    async fn latest_step_order(&self, execution_id: &str) -> Result<Option<u64>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_round_trips_through_text() {
        for s in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
        ] {
            assert_eq!(s.as_str().parse::<RunStatus>().unwrap(), s);
        }
        assert!("DONE".parse::<RunStatus>().is_err());
        assert!(RunStatus::Interrupted.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
