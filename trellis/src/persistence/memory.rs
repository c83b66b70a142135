//! In-memory run store (RunStore implementation).
//!
//! Not persistent; for tests and single-process use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{NewRun, RunStatus, RunStatusUpdate, RunStore, StepRecord, StoreError};

/// Everything recorded about one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunRecord {
    pub run: NewRun,
    pub status: RunStatus,
    pub final_value: Option<Value>,
    pub elapsed: Option<Duration>,
    /// Sorted by order.
    pub steps: Vec<StepRecord>,
}

/// In-memory [`RunStore`]. Cloning shares the same storage.
///
/// **Interaction**: Used by tests and by the CLI when no database path is given; tests read
/// records back via [`InMemoryRunStore::run`].
#[derive(Clone, Default)]
pub struct InMemoryRunStore {
    inner: Arc<RwLock<HashMap<String, RunRecord>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one run.
    pub async fn run(&self, execution_id: &str) -> Option<RunRecord> {
        self.inner.read().await.get(execution_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(&self, run: &NewRun) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard
            .entry(run.execution_id.clone())
            .or_insert_with(|| RunRecord {
                run: run.clone(),
                status: RunStatus::Pending,
                final_value: None,
                elapsed: None,
                steps: Vec::new(),
            });
        Ok(())
    }

    async fn update_run_status(
        &self,
        execution_id: &str,
        update: RunStatusUpdate,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let record = guard
            .get_mut(execution_id)
            .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
        record.status = update.status;
        if update.final_value.is_some() {
            record.final_value = update.final_value;
        }
        if update.elapsed.is_some() {
            record.elapsed = update.elapsed;
        }
        Ok(())
    }

    async fn append_step(&self, execution_id: &str, step: StepRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let record = guard
            .get_mut(execution_id)
            .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
        match record.steps.binary_search_by_key(&step.order, |s| s.order) {
            Ok(_) => {}
            Err(pos) => record.steps.insert(pos, step),
        }
        Ok(())
    }

    async fn latest_step_order(&self, execution_id: &str) -> Result<Option<u64>, StoreError> {
        let guard = self.inner.read().await;
        let record = guard
            .get(execution_id)
            .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
        Ok(record.steps.last().map(|s| s.order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_run(id: &str) -> NewRun {
        NewRun {
            execution_id: id.to_string(),
            pipeline_id: "p".to_string(),
            session_id: "s".to_string(),
            model_name: "mock".to_string(),
            query: "q".to_string(),
        }
    }

    /// **Scenario**: Appending an already-recorded order is a no-op; latest order tracks max.
    #[tokio::test]
    async fn append_is_idempotent_per_order() {
        let store = InMemoryRunStore::new();
        store.create_run(&new_run("r1")).await.unwrap();
        assert_eq!(store.latest_step_order("r1").await.unwrap(), None);

        store
            .append_step("r1", StepRecord::new(1, "in", "input", json!({"query": "q"})))
            .await
            .unwrap();
        store
            .append_step("r1", StepRecord::new(2, "a", "agent", json!({"output": "x"})))
            .await
            .unwrap();
        store
            .append_step("r1", StepRecord::new(2, "a", "agent", json!({"output": "retry"})))
            .await
            .unwrap();

        let record = store.run("r1").await.unwrap();
        assert_eq!(record.steps.len(), 2);
        assert_eq!(record.steps[1].payload["output"], "x");
        assert_eq!(store.latest_step_order("r1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn status_update_keeps_final_value_when_absent() {
        let store = InMemoryRunStore::new();
        store.create_run(&new_run("r1")).await.unwrap();
        store
            .update_run_status("r1", RunStatusUpdate::completed(json!("42"), Duration::from_millis(5)))
            .await
            .unwrap();
        store
            .update_run_status("r1", RunStatusUpdate::status(RunStatus::Interrupted))
            .await
            .unwrap();
        let record = store.run("r1").await.unwrap();
        assert_eq!(record.status, RunStatus::Interrupted);
        assert_eq!(record.final_value, Some(json!("42")));
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let store = InMemoryRunStore::new();
        assert_eq!(
            store.latest_step_order("nope").await,
            Err(StoreError::NotFound("nope".to_string()))
        );
        assert!(store.is_empty().await);
    }
}
