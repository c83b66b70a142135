//! SQLite-backed run store (SqliteRunStore). Persistent across process restarts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{NewRun, RunStatus, RunStatusUpdate, RunStore, StepRecord, StoreError};

fn storage(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// SQLite [`RunStore`]. Key: `execution_id` for runs, `(execution_id, step_order)` for steps.
///
/// Uses spawn_blocking for async; opens a connection per call.
///
/// **Interaction**: Used by the CLI with `--db`, so `trellis resume` in a later process
/// continues the step order that `trellis run` recorded.
pub struct SqliteRunStore {
    db_path: PathBuf,
}

impl SqliteRunStore {
    /// Opens (or creates) the database and ensures the tables exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path).map_err(storage)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                execution_id TEXT PRIMARY KEY,
                pipeline_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                model_name TEXT NOT NULL,
                query TEXT NOT NULL,
                status TEXT NOT NULL,
                final_value TEXT,
                elapsed_ms INTEGER,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS steps (
                execution_id TEXT NOT NULL,
                step_order INTEGER NOT NULL,
                node_id TEXT NOT NULL,
                node_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (execution_id, step_order)
            );
            "#,
        )
        .map_err(storage)?;
        Ok(Self { db_path })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).map_err(storage)?;
            f(&conn)
        })
        .await
        .map_err(storage)?
    }

    /// Current status of a run, if recorded.
    pub async fn status(&self, execution_id: &str) -> Result<Option<RunStatus>, StoreError> {
        let id = execution_id.to_string();
        let raw: Option<String> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT status FROM runs WHERE execution_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage)
            })
            .await?;
        raw.map(|s| s.parse()).transpose()
    }

    /// All steps of a run in order.
    pub async fn steps(&self, execution_id: &str) -> Result<Vec<StepRecord>, StoreError> {
        let id = execution_id.to_string();
        type Row = (i64, String, String, String, String);
        let rows: Vec<Row> = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT step_order, node_id, node_type, payload, recorded_at
                         FROM steps WHERE execution_id = ?1 ORDER BY step_order",
                    )
                    .map_err(storage)?;
                let mapped = stmt
                    .query_map(params![id], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    })
                    .map_err(storage)?;
                mapped.collect::<Result<Vec<Row>, _>>().map_err(storage)
            })
            .await?;

        rows.into_iter()
            .map(|(order, node_id, node_type, payload, recorded_at)| {
                Ok(StepRecord {
                    order: order as u64,
                    node_id,
                    node_type,
                    payload: serde_json::from_str(&payload)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|e| StoreError::Serialization(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn create_run(&self, run: &NewRun) -> Result<(), StoreError> {
        let run = run.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR IGNORE INTO runs
                (execution_id, pipeline_id, session_id, model_name, query, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    run.execution_id,
                    run.pipeline_id,
                    run.session_id,
                    run.model_name,
                    run.query,
                    RunStatus::Pending.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(storage)?;
            Ok(())
        })
        .await
    }

    async fn update_run_status(
        &self,
        execution_id: &str,
        update: RunStatusUpdate,
    ) -> Result<(), StoreError> {
        let id = execution_id.to_string();
        let final_value = update
            .final_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let elapsed_ms = update.elapsed.map(|d| d.as_millis() as i64);
        let status = update.status.as_str();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    r#"
                    UPDATE runs SET status = ?2,
                        final_value = COALESCE(?3, final_value),
                        elapsed_ms = COALESCE(?4, elapsed_ms)
                    WHERE execution_id = ?1
                    "#,
                    params![id, status, final_value, elapsed_ms],
                )
                .map_err(storage)?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn append_step(&self, execution_id: &str, step: StepRecord) -> Result<(), StoreError> {
        let id = execution_id.to_string();
        let payload = serde_json::to_string(&step.payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR IGNORE INTO steps
                (execution_id, step_order, node_id, node_type, payload, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    id,
                    step.order as i64,
                    step.node_id,
                    step.node_type,
                    payload,
                    step.recorded_at.to_rfc3339(),
                ],
            )
            .map_err(storage)?;
            Ok(())
        })
        .await
    }

    async fn latest_step_order(&self, execution_id: &str) -> Result<Option<u64>, StoreError> {
        let id = execution_id.to_string();
        let max: Option<i64> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT MAX(step_order) FROM steps WHERE execution_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(storage)
            })
            .await?;
        Ok(max.map(|m| m as u64))
    }
}
