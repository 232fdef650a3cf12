//! Domain types for folder configuration, the processed-file ledger and run
//! records.
//!
//! These types are the single source of truth; every stage of the dispatch
//! pipeline reads them instead of raw rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Folder configuration
// ============================================================================

/// How a folder target is reached.
///
/// `Smb` and `Sftp` targets are expected to be locally mounted; `Ftp` targets
/// are staged into a scratch directory before discovery.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Local,
    Smb,
    Sftp,
    Ftp,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Smb => "smb",
            Self::Sftp => "sftp",
            Self::Ftp => "ftp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "smb" => Some(Self::Smb),
            "sftp" => Some(Self::Sftp),
            "ftp" => Some(Self::Ftp),
            _ => None,
        }
    }
}

/// Which direction the split category filter works in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Only listed categories survive.
    #[default]
    Include,
    /// Listed categories are removed.
    Exclude,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "include" => Some(Self::Include),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }
}

/// One watched folder and its processing parameters.
///
/// Loaded once per run and read-only through the pipeline, except the
/// enabled flag which is cleared when the target no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub id: i64,
    /// Unique human-readable name; folders are processed in alias order.
    pub alias: String,
    /// Target path (or FTP root for ftp connections).
    pub folder_name: String,
    pub connection_type: ConnectionType,
    pub enabled: bool,
    /// Free-form schedule string consumed by the external scheduler.
    pub schedule: String,

    // EDI processing
    pub process_edi: bool,
    /// Named record-format definition used for parsing and validation.
    pub edi_format: String,
    /// Converter registry key; empty means no conversion.
    pub convert_to_format: String,
    pub split_edi: bool,
    pub split_edi_include_invoices: bool,
    pub split_edi_include_credits: bool,
    /// "ALL" or a comma-separated category list.
    pub split_filter_categories: String,
    pub split_filter_mode: FilterMode,
    pub tweak_edi: bool,
    pub force_edi_validation: bool,
    pub calc_upc_check_digit: bool,

    // Output naming
    pub rename_file: bool,
    pub rename_template: String,
    pub prepend_date_files: bool,

    // Delivery backends
    pub process_backend_copy: bool,
    pub copy_destination: String,
    pub process_backend_ftp: bool,
    pub ftp_server: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub ftp_password: String,
    pub ftp_folder: String,
    pub process_backend_email: bool,
    pub email_to: String,
}

impl FolderConfig {
    /// Whether any stage of this config requires structural EDI validation.
    pub fn wants_validation(&self) -> bool {
        self.process_edi || self.split_edi || self.tweak_edi || self.force_edi_validation
    }

    /// Whether at least one delivery backend is enabled.
    pub fn any_backend_enabled(&self) -> bool {
        self.process_backend_copy || self.process_backend_ftp || self.process_backend_email
    }
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            id: 0,
            alias: String::new(),
            folder_name: String::new(),
            connection_type: ConnectionType::Local,
            enabled: true,
            schedule: String::new(),
            process_edi: false,
            edi_format: "standard".to_string(),
            convert_to_format: String::new(),
            split_edi: false,
            split_edi_include_invoices: true,
            split_edi_include_credits: true,
            split_filter_categories: "ALL".to_string(),
            split_filter_mode: FilterMode::Include,
            tweak_edi: false,
            force_edi_validation: false,
            calc_upc_check_digit: false,
            rename_file: false,
            rename_template: String::new(),
            prepend_date_files: false,
            process_backend_copy: false,
            copy_destination: String::new(),
            process_backend_ftp: false,
            ftp_server: String::new(),
            ftp_port: 21,
            ftp_user: String::new(),
            ftp_password: String::new(),
            ftp_folder: String::new(),
            process_backend_email: false,
            email_to: String::new(),
        }
    }
}

// ============================================================================
// Processed-file ledger
// ============================================================================

/// Destination placeholder for backends that were not used for a file.
pub const DESTINATION_UNUSED: &str = "N/A";

/// One delivered artifact.
///
/// `(file_name, file_checksum)` identifies the artifact; a record with
/// `resend_flag` set is eligible for redelivery even if unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFileRecord {
    pub file_name: String,
    pub folder_id: i64,
    pub folder_alias: String,
    pub file_checksum: String,
    pub sent_date_time: DateTime<Utc>,
    pub copy_destination: String,
    pub ftp_destination: String,
    pub email_destination: String,
    pub resend_flag: bool,
}

// ============================================================================
// Run records
// ============================================================================

/// Lifecycle state of a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Audit record for one dispatch run. Created at run start, finalized once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub files_processed: u64,
    pub files_failed: u64,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_type_round_trips() {
        for ct in [
            ConnectionType::Local,
            ConnectionType::Smb,
            ConnectionType::Sftp,
            ConnectionType::Ftp,
        ] {
            assert_eq!(ConnectionType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ConnectionType::parse("s3"), None);
    }

    #[test]
    fn wants_validation_covers_all_triggers() {
        let mut config = FolderConfig::default();
        assert!(!config.wants_validation());
        config.force_edi_validation = true;
        assert!(config.wants_validation());

        let mut config = FolderConfig {
            split_edi: true,
            ..Default::default()
        };
        assert!(config.wants_validation());
        config.split_edi = false;
        config.tweak_edi = true;
        assert!(config.wants_validation());
    }
}
