//! Global settings loaded once per run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Installation-wide settings, read from a TOML file. Folder-specific
/// behavior lives in the folder configs instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Ledger database location.
    pub database_path: PathBuf,
    /// Working area for staged, split and converted files.
    pub scratch_dir: PathBuf,
    /// Where per-folder error logs and validator reports are written.
    pub error_log_dir: PathBuf,
    /// Optional UPC → category table (JSON export of the item service).
    pub lookup_table: Option<PathBuf>,
    /// Concurrent per-file pipelines within one folder.
    pub max_workers: usize,

    // Mail relay for the email backend and error-log delivery.
    pub smtp_host: String,
    pub smtp_port: u16,
    pub email_from: String,
    /// Recipients for error logs and validator reports.
    pub admin_recipients: String,
    /// Queue per-folder error logs for email at the end of a run.
    pub email_error_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let home = waybill_logging::waybill_home();
        Self {
            database_path: home.join("waybill.sqlite3"),
            scratch_dir: home.join("scratch"),
            error_log_dir: waybill_logging::error_logs_dir(),
            lookup_table: None,
            max_workers: 4,
            smtp_host: String::new(),
            smtp_port: 25,
            email_from: String::new(),
            admin_recipients: String::new(),
            email_error_logs: false,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no file is given and
    /// the default location does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = waybill_logging::waybill_home().join("config.toml");
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Whether the mail relay is usable.
    pub fn smtp_configured(&self) -> bool {
        !self.smtp_host.is_empty() && !self.email_from.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            max_workers = 8
            smtp_host = "mail.internal"
            email_from = "dispatch@example.com"
            "#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.max_workers, 8);
        assert!(settings.smtp_configured());
        assert_eq!(settings.smtp_port, 25);
        assert!(!settings.email_error_logs);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
