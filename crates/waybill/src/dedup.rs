//! Content-addressed deduplication against the processed-file ledger.
//!
//! Dedup keys on content, not path: identical content reappearing under a
//! different name is still "already processed" unless explicitly flagged
//! for resend.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use waybill_db::ProcessedFileRecord;

/// One folder's slice of the ledger, indexed for classification.
#[derive(Debug, Default, Clone)]
pub struct FolderLedger {
    file_by_checksum: HashMap<String, String>,
    resend: HashSet<String>,
}

impl FolderLedger {
    pub fn from_records(records: &[ProcessedFileRecord]) -> Self {
        let mut ledger = Self::default();
        for record in records {
            ledger
                .file_by_checksum
                .insert(record.file_checksum.clone(), record.file_name.clone());
            if record.resend_flag {
                ledger.resend.insert(record.file_checksum.clone());
            }
        }
        ledger
    }

    /// Whether a file with this digest should be sent.
    pub fn should_send(&self, checksum: &str) -> bool {
        !self.file_by_checksum.contains_key(checksum) || self.resend.contains(checksum)
    }

    pub fn is_resend(&self, checksum: &str) -> bool {
        self.resend.contains(checksum)
    }
}

/// A discovered file with its dedup classification.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub checksum: String,
    pub send: bool,
    pub resend: bool,
}

/// Classify discovered-and-hashed files against the folder's ledger slice.
pub fn classify_files(
    files: Vec<(PathBuf, String)>,
    ledger: &FolderLedger,
) -> Vec<FileCandidate> {
    files
        .into_iter()
        .map(|(path, checksum)| {
            let send = ledger.should_send(&checksum);
            let resend = ledger.is_resend(&checksum);
            FileCandidate {
                path,
                checksum,
                send,
                resend,
            }
        })
        .collect()
}
