//! Processed-file ledger operations.
//!
//! Records are written only after every enabled backend succeeded for a
//! file; the resend flag marks an unchanged file for redelivery.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::WaybillDb;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Only the most recent records per folder are retained.
pub const LEDGER_RETENTION_PER_FOLDER: i64 = 5_000;

impl WaybillDb {
    /// Load the full ledger, one snapshot per run.
    pub async fn list_processed_files(&self) -> Result<Vec<ProcessedFileRecord>> {
        let rows = sqlx::query("SELECT * FROM processed_files ORDER BY sent_date_time ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_processed_file).collect()
    }

    /// Load one folder's slice of the ledger.
    pub async fn processed_files_for_folder(
        &self,
        folder_id: i64,
    ) -> Result<Vec<ProcessedFileRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM processed_files WHERE folder_id = ? ORDER BY sent_date_time ASC",
        )
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_processed_file).collect()
    }

    /// Record a delivered file.
    ///
    /// Redelivery of the same (folder, name, checksum) refreshes the sent
    /// time and destinations and clears the resend flag.
    pub async fn record_processed_file(&self, record: &ProcessedFileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_files (
                file_name, folder_id, folder_alias, file_checksum, sent_date_time,
                copy_destination, ftp_destination, email_destination, resend_flag
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(folder_id, file_name, file_checksum) DO UPDATE SET
                sent_date_time = excluded.sent_date_time,
                copy_destination = excluded.copy_destination,
                ftp_destination = excluded.ftp_destination,
                email_destination = excluded.email_destination,
                resend_flag = 0
            "#,
        )
        .bind(&record.file_name)
        .bind(record.folder_id)
        .bind(&record.folder_alias)
        .bind(&record.file_checksum)
        .bind(record.sent_date_time.timestamp_millis())
        .bind(&record.copy_destination)
        .bind(&record.ftp_destination)
        .bind(&record.email_destination)
        .bind(record.resend_flag)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flag a previously delivered file for redelivery.
    pub async fn set_resend_flag(
        &self,
        folder_alias: &str,
        file_checksum: &str,
        resend: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE processed_files SET resend_flag = ? WHERE folder_alias = ? AND file_checksum = ?",
        )
        .bind(resend)
        .bind(folder_alias)
        .bind(file_checksum)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!(
                "no ledger entry for {folder_alias} with checksum {file_checksum}"
            )));
        }
        Ok(())
    }

    /// Prune a folder's ledger down to the retention window.
    ///
    /// Runs after a successful folder pass. Returns the number of pruned rows.
    pub async fn trim_processed_files(&self, folder_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM processed_files
            WHERE folder_id = ?1
              AND id NOT IN (
                  SELECT id FROM processed_files
                  WHERE folder_id = ?1
                  ORDER BY sent_date_time DESC, id DESC
                  LIMIT ?2
              )
            "#,
        )
        .bind(folder_id)
        .bind(LEDGER_RETENTION_PER_FOLDER)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn row_to_processed_file(row: &SqliteRow) -> Result<ProcessedFileRecord> {
    Ok(ProcessedFileRecord {
        file_name: row.get("file_name"),
        folder_id: row.get("folder_id"),
        folder_alias: row.get("folder_alias"),
        file_checksum: row.get("file_checksum"),
        sent_date_time: WaybillDb::millis_to_datetime(row.get::<i64, _>("sent_date_time")),
        copy_destination: row.get("copy_destination"),
        ftp_destination: row.get("ftp_destination"),
        email_destination: row.get("email_destination"),
        resend_flag: row.get("resend_flag"),
    })
}
