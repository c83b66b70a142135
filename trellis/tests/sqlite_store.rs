//! Integration test: a full run recorded in the SQLite run store.

mod common;

use std::sync::Arc;

use serde_json::json;
use trellis::{MockLanguageModel, RunInput, RunStatus, ScriptedAgent, SqliteRunStore};

use common::*;

/// **Scenario**: A completed run leaves a COMPLETED row and three ordered steps on disk.
#[tokio::test]
async fn run_is_recorded_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteRunStore::new(dir.path().join("runs.db")).unwrap());
    let engine = engine(
        Arc::new(MockLanguageModel::with_reply("unused")),
        Arc::new(ScriptedAgent::new().reply("answerer", "42")),
        store.clone(),
    );

    let (_events, outcome) = execute_collect(
        &engine,
        &three_node_pipeline(),
        RunInput::new("s1", "q").with_execution_id("sql-1"),
    )
    .await;
    assert_eq!(outcome.unwrap().response(), Some(&json!("42")));

    assert_eq!(store.status("sql-1").await.unwrap(), Some(RunStatus::Completed));
    let steps = store.steps("sql-1").await.unwrap();
    let orders: Vec<u64> = steps.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(steps[1].payload["output"], json!("42"));
}
