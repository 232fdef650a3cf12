//! Run record operations (audit trail, append-only).

use crate::error::{DbError, Result};
use crate::types::*;
use crate::WaybillDb;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl WaybillDb {
    /// Create a run record in the running state. Returns the run id.
    pub async fn create_run(&self) -> Result<i64> {
        let result = sqlx::query("INSERT INTO runs (started_at, status) VALUES (?, 'running')")
            .bind(Self::now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Finalize a run as completed. May only transition from running.
    pub async fn complete_run(
        &self,
        run_id: i64,
        files_processed: u64,
        files_failed: u64,
    ) -> Result<()> {
        self.finalize_run(run_id, RunStatus::Completed, files_processed, files_failed, None)
            .await
    }

    /// Finalize a run as failed with an error message.
    pub async fn fail_run(
        &self,
        run_id: i64,
        files_processed: u64,
        files_failed: u64,
        error_message: &str,
    ) -> Result<()> {
        self.finalize_run(
            run_id,
            RunStatus::Failed,
            files_processed,
            files_failed,
            Some(error_message),
        )
        .await
    }

    async fn finalize_run(
        &self,
        run_id: i64,
        status: RunStatus,
        files_processed: u64,
        files_failed: u64,
        error_message: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE runs SET
                completed_at = ?,
                status = ?,
                files_processed = ?,
                files_failed = ?,
                error_message = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(Self::now_millis())
        .bind(status.as_str())
        .bind(files_processed as i64)
        .bind(files_failed as i64)
        .bind(error_message)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!(
                "run {run_id} not found or already finalized"
            )));
        }
        Ok(())
    }

    /// List the most recent runs.
    pub async fn list_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query("SELECT * FROM runs ORDER BY started_at DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_run).collect()
    }
}

fn row_to_run(row: &SqliteRow) -> Result<RunRecord> {
    let status: String = row.get("status");
    let status = RunStatus::parse(&status)
        .ok_or_else(|| DbError::invalid_value(format!("unknown run status: {status}")))?;

    Ok(RunRecord {
        id: row.get("id"),
        started_at: WaybillDb::millis_to_datetime(row.get::<i64, _>("started_at")),
        completed_at: row
            .get::<Option<i64>, _>("completed_at")
            .map(WaybillDb::millis_to_datetime),
        status,
        files_processed: row.get::<i64, _>("files_processed") as u64,
        files_failed: row.get::<i64, _>("files_failed") as u64,
        error_message: row.get("error_message"),
    })
}
