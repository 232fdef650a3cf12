//! Per-folder error accumulation and report files.
//!
//! Per-file errors never escape a folder's processing loop; they land here
//! and are written out (and optionally queued for email) once the folder's
//! barrier has passed. Minor validator findings get their own consolidated
//! report at the end of the run.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One failed stage for one file.
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub file: String,
    pub stage: &'static str,
    pub message: String,
}

/// Error accumulator for one folder's run.
#[derive(Debug)]
pub struct FolderErrorLog {
    alias: String,
    entries: Vec<ErrorEntry>,
}

impl FolderErrorLog {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, file: impl Into<String>, stage: &'static str, message: impl Into<String>) {
        self.entries.push(ErrorEntry {
            file: file.into(),
            stage,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// Write the log file: `<alias>_<timestamp>.log` under `dir`.
    pub fn write(&self, dir: &Path, now: DateTime<Utc>) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_{}.log", self.alias, now.format("%Y%m%d%H%M%S")));
        let mut file = fs::File::create(&path)?;

        writeln!(
            file,
            "Errors for folder '{}' at {} ({} total)",
            self.alias,
            now.format("%Y-%m-%d %H:%M:%S UTC"),
            self.entries.len()
        )?;
        for entry in &self.entries {
            writeln!(file, "[{}] {}: {}", entry.stage, entry.file, entry.message)?;
        }
        Ok(path)
    }
}

/// Write the consolidated minor-validation report for a run.
pub fn write_validator_report(
    dir: &Path,
    warnings: &[String],
    now: DateTime<Utc>,
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "edi_validator_report_{}.log",
        now.format("%Y%m%d%H%M%S")
    ));
    let mut file = fs::File::create(&path)?;

    writeln!(
        file,
        "EDI validator findings at {} ({} total)",
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        warnings.len()
    )?;
    for warning in warnings {
        writeln!(file, "{warning}")?;
    }
    Ok(path)
}
