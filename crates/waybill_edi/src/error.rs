//! Error types for EDI parsing, splitting and conversion.

use std::io;
use thiserror::Error;

/// EDI processing error type.
#[derive(Error, Debug)]
pub enum EdiError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown EDI format: {0}")]
    UnknownFormat(String),

    #[error("Unknown converter format: {0}")]
    UnknownConverter(String),

    #[error("Unknown tweaker: {0}")]
    UnknownTweaker(String),

    #[error("{file} line {line}: {message}")]
    MalformedRecord {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Line-item record before first invoice header in {file} (line {line})")]
    RecordBeforeHeader { file: String, line: usize },

    #[error(
        "Split line counts do not reconcile for {file}: read {read}, wrote {written}, dropped {dropped}"
    )]
    SplitReconciliation {
        file: String,
        read: usize,
        written: usize,
        dropped: usize,
    },

    #[error("No invoices survived splitting {file}")]
    NoInvoicesSurvived { file: String },

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Tweak failed: {0}")]
    Tweak(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EdiError>;
