//! Error types for the dispatch pipeline.

use std::io;
use thiserror::Error;

/// Dispatch errors.
///
/// `FolderDesync` indicates pipeline corruption (the hashing stage handed
/// over a batch for a different folder than the one being processed) and
/// fails the run rather than being papered over.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Db(#[from] waybill_db::DbError),

    #[error("EDI error: {0}")]
    Edi(#[from] waybill_edi::EdiError),

    #[error("Send error: {0}")]
    Send(#[from] waybill_send::SendError),

    #[error("Hash stage out of sync: processing folder '{expected}' but received batch for '{got}'")]
    FolderDesync { expected: String, got: String },

    #[error("Hashing stage terminated before folder '{0}' was served")]
    HashStageDied(String),

    #[error("Fatal error processing {file} in folder '{alias}': {message}")]
    FolderAborted {
        alias: String,
        file: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DispatchError>;
