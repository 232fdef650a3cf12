//! Database schema creation for all Waybill tables.
//!
//! All CREATE TABLE statements live here - single source of truth.

use crate::error::Result;
use crate::WaybillDb;
use tracing::info;

impl WaybillDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // WAL for concurrent reader access during a run
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_folder_tables().await?;
        self.create_ledger_tables().await?;
        self.create_run_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    /// Folder configurations: watched locations and processing parameters.
    async fn create_folder_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS folder_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alias TEXT NOT NULL UNIQUE,
                folder_name TEXT NOT NULL,
                connection_type TEXT NOT NULL DEFAULT 'local',
                enabled INTEGER NOT NULL DEFAULT 1,
                schedule TEXT NOT NULL DEFAULT '',
                process_edi INTEGER NOT NULL DEFAULT 0,
                edi_format TEXT NOT NULL DEFAULT 'standard',
                convert_to_format TEXT NOT NULL DEFAULT '',
                split_edi INTEGER NOT NULL DEFAULT 0,
                split_edi_include_invoices INTEGER NOT NULL DEFAULT 1,
                split_edi_include_credits INTEGER NOT NULL DEFAULT 1,
                split_filter_categories TEXT NOT NULL DEFAULT 'ALL',
                split_filter_mode TEXT NOT NULL DEFAULT 'include',
                tweak_edi INTEGER NOT NULL DEFAULT 0,
                force_edi_validation INTEGER NOT NULL DEFAULT 0,
                calc_upc_check_digit INTEGER NOT NULL DEFAULT 0,
                rename_file INTEGER NOT NULL DEFAULT 0,
                rename_template TEXT NOT NULL DEFAULT '',
                prepend_date_files INTEGER NOT NULL DEFAULT 0,
                process_backend_copy INTEGER NOT NULL DEFAULT 0,
                copy_destination TEXT NOT NULL DEFAULT '',
                process_backend_ftp INTEGER NOT NULL DEFAULT 0,
                ftp_server TEXT NOT NULL DEFAULT '',
                ftp_port INTEGER NOT NULL DEFAULT 21,
                ftp_user TEXT NOT NULL DEFAULT '',
                ftp_password TEXT NOT NULL DEFAULT '',
                ftp_folder TEXT NOT NULL DEFAULT '',
                process_backend_email INTEGER NOT NULL DEFAULT 0,
                email_to TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Processed-file ledger: one row per delivered artifact.
    async fn create_ledger_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS processed_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name TEXT NOT NULL,
                folder_id INTEGER NOT NULL REFERENCES folder_configs(id),
                folder_alias TEXT NOT NULL,
                file_checksum TEXT NOT NULL,
                sent_date_time INTEGER NOT NULL,
                copy_destination TEXT NOT NULL DEFAULT 'N/A',
                ftp_destination TEXT NOT NULL DEFAULT 'N/A',
                email_destination TEXT NOT NULL DEFAULT 'N/A',
                resend_flag INTEGER NOT NULL DEFAULT 0,
                UNIQUE(folder_id, file_name, file_checksum)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_processed_files_folder
             ON processed_files(folder_id, sent_date_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Run records: one row per dispatch run, append-only.
    async fn create_run_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                status TEXT NOT NULL DEFAULT 'running',
                files_processed INTEGER NOT NULL DEFAULT 0,
                files_failed INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
