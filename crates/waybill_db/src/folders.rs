//! Folder configuration operations.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::WaybillDb;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl WaybillDb {
    /// Insert or update a folder config, keyed by alias.
    ///
    /// Returns the folder id.
    pub async fn upsert_folder_config(&self, config: &FolderConfig) -> Result<i64> {
        let now = Self::now_millis();
        sqlx::query(
            r#"
            INSERT INTO folder_configs (
                alias, folder_name, connection_type, enabled, schedule,
                process_edi, edi_format, convert_to_format,
                split_edi, split_edi_include_invoices, split_edi_include_credits,
                split_filter_categories, split_filter_mode,
                tweak_edi, force_edi_validation, calc_upc_check_digit,
                rename_file, rename_template, prepend_date_files,
                process_backend_copy, copy_destination,
                process_backend_ftp, ftp_server, ftp_port, ftp_user, ftp_password, ftp_folder,
                process_backend_email, email_to,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(alias) DO UPDATE SET
                folder_name = excluded.folder_name,
                connection_type = excluded.connection_type,
                enabled = excluded.enabled,
                schedule = excluded.schedule,
                process_edi = excluded.process_edi,
                edi_format = excluded.edi_format,
                convert_to_format = excluded.convert_to_format,
                split_edi = excluded.split_edi,
                split_edi_include_invoices = excluded.split_edi_include_invoices,
                split_edi_include_credits = excluded.split_edi_include_credits,
                split_filter_categories = excluded.split_filter_categories,
                split_filter_mode = excluded.split_filter_mode,
                tweak_edi = excluded.tweak_edi,
                force_edi_validation = excluded.force_edi_validation,
                calc_upc_check_digit = excluded.calc_upc_check_digit,
                rename_file = excluded.rename_file,
                rename_template = excluded.rename_template,
                prepend_date_files = excluded.prepend_date_files,
                process_backend_copy = excluded.process_backend_copy,
                copy_destination = excluded.copy_destination,
                process_backend_ftp = excluded.process_backend_ftp,
                ftp_server = excluded.ftp_server,
                ftp_port = excluded.ftp_port,
                ftp_user = excluded.ftp_user,
                ftp_password = excluded.ftp_password,
                ftp_folder = excluded.ftp_folder,
                process_backend_email = excluded.process_backend_email,
                email_to = excluded.email_to,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&config.alias)
        .bind(&config.folder_name)
        .bind(config.connection_type.as_str())
        .bind(config.enabled)
        .bind(&config.schedule)
        .bind(config.process_edi)
        .bind(&config.edi_format)
        .bind(&config.convert_to_format)
        .bind(config.split_edi)
        .bind(config.split_edi_include_invoices)
        .bind(config.split_edi_include_credits)
        .bind(&config.split_filter_categories)
        .bind(config.split_filter_mode.as_str())
        .bind(config.tweak_edi)
        .bind(config.force_edi_validation)
        .bind(config.calc_upc_check_digit)
        .bind(config.rename_file)
        .bind(&config.rename_template)
        .bind(config.prepend_date_files)
        .bind(config.process_backend_copy)
        .bind(&config.copy_destination)
        .bind(config.process_backend_ftp)
        .bind(&config.ftp_server)
        .bind(config.ftp_port as i64)
        .bind(&config.ftp_user)
        .bind(&config.ftp_password)
        .bind(&config.ftp_folder)
        .bind(config.process_backend_email)
        .bind(&config.email_to)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id FROM folder_configs WHERE alias = ?")
            .bind(&config.alias)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("id"))
    }

    /// Load enabled folder configs in alias order. This is the run's folder
    /// processing order.
    pub async fn list_active_folder_configs(&self) -> Result<Vec<FolderConfig>> {
        let rows = sqlx::query("SELECT * FROM folder_configs WHERE enabled = 1 ORDER BY alias ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_folder_config).collect()
    }

    /// Load all folder configs in alias order.
    pub async fn list_folder_configs(&self) -> Result<Vec<FolderConfig>> {
        let rows = sqlx::query("SELECT * FROM folder_configs ORDER BY alias ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_folder_config).collect()
    }

    /// Get a folder config by alias.
    pub async fn get_folder_by_alias(&self, alias: &str) -> Result<Option<FolderConfig>> {
        let row = sqlx::query("SELECT * FROM folder_configs WHERE alias = ?")
            .bind(alias)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_folder_config).transpose()
    }

    /// Enable or disable a folder. Used when a target folder disappears.
    pub async fn set_folder_enabled(&self, folder_id: i64, enabled: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE folder_configs SET enabled = ?, updated_at = ? WHERE id = ?",
        )
        .bind(enabled)
        .bind(Self::now_millis())
        .bind(folder_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("folder id {}", folder_id)));
        }
        Ok(())
    }
}

fn row_to_folder_config(row: &SqliteRow) -> Result<FolderConfig> {
    let connection_type: String = row.get("connection_type");
    let connection_type = ConnectionType::parse(&connection_type).ok_or_else(|| {
        DbError::invalid_value(format!("unknown connection type: {connection_type}"))
    })?;
    let filter_mode: String = row.get("split_filter_mode");
    let filter_mode = FilterMode::parse(&filter_mode)
        .ok_or_else(|| DbError::invalid_value(format!("unknown filter mode: {filter_mode}")))?;

    Ok(FolderConfig {
        id: row.get("id"),
        alias: row.get("alias"),
        folder_name: row.get("folder_name"),
        connection_type,
        enabled: row.get("enabled"),
        schedule: row.get("schedule"),
        process_edi: row.get("process_edi"),
        edi_format: row.get("edi_format"),
        convert_to_format: row.get("convert_to_format"),
        split_edi: row.get("split_edi"),
        split_edi_include_invoices: row.get("split_edi_include_invoices"),
        split_edi_include_credits: row.get("split_edi_include_credits"),
        split_filter_categories: row.get("split_filter_categories"),
        split_filter_mode: filter_mode,
        tweak_edi: row.get("tweak_edi"),
        force_edi_validation: row.get("force_edi_validation"),
        calc_upc_check_digit: row.get("calc_upc_check_digit"),
        rename_file: row.get("rename_file"),
        rename_template: row.get("rename_template"),
        prepend_date_files: row.get("prepend_date_files"),
        process_backend_copy: row.get("process_backend_copy"),
        copy_destination: row.get("copy_destination"),
        process_backend_ftp: row.get("process_backend_ftp"),
        ftp_server: row.get("ftp_server"),
        ftp_port: row.get::<i64, _>("ftp_port") as u16,
        ftp_user: row.get("ftp_user"),
        ftp_password: row.get("ftp_password"),
        ftp_folder: row.get("ftp_folder"),
        process_backend_email: row.get("process_backend_email"),
        email_to: row.get("email_to"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(alias: &str) -> FolderConfig {
        FolderConfig {
            alias: alias.to_string(),
            folder_name: format!("/data/{alias}"),
            process_edi: true,
            convert_to_format: "csv".to_string(),
            process_backend_copy: true,
            copy_destination: "/out".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_and_list_orders_by_alias() {
        let db = WaybillDb::open_in_memory().await.unwrap();

        db.upsert_folder_config(&sample_config("beta")).await.unwrap();
        db.upsert_folder_config(&sample_config("alpha")).await.unwrap();

        let configs = db.list_active_folder_configs().await.unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].alias, "alpha");
        assert_eq!(configs[1].alias, "beta");
        assert_eq!(configs[0].convert_to_format, "csv");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_alias() {
        let db = WaybillDb::open_in_memory().await.unwrap();

        let id1 = db.upsert_folder_config(&sample_config("store42")).await.unwrap();
        let mut updated = sample_config("store42");
        updated.split_edi = true;
        let id2 = db.upsert_folder_config(&updated).await.unwrap();

        assert_eq!(id1, id2);
        let fetched = db.get_folder_by_alias("store42").await.unwrap().unwrap();
        assert!(fetched.split_edi);
    }

    #[tokio::test]
    async fn disable_folder_removes_it_from_active_list() {
        let db = WaybillDb::open_in_memory().await.unwrap();

        let id = db.upsert_folder_config(&sample_config("store1")).await.unwrap();
        db.set_folder_enabled(id, false).await.unwrap();

        assert!(db.list_active_folder_configs().await.unwrap().is_empty());
        assert_eq!(db.list_folder_configs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_enabled_on_missing_folder_is_not_found() {
        let db = WaybillDb::open_in_memory().await.unwrap();
        let err = db.set_folder_enabled(99, false).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
