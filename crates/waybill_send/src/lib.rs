//! Delivery backends for finished output files.
//!
//! Each backend implements exactly one delivery attempt ([`SendBackend::send_once`]);
//! the shared retry wrapper gives every backend the same bounded-retry
//! behavior, and [`SendManager`] fans one file out across the backends a
//! folder has enabled. A file counts as delivered only when every enabled
//! backend succeeded.

mod copy;
mod email;
mod ftp;

pub use copy::CopyBackend;
pub use email::{EmailBackend, EmailParams};
pub use ftp::{FtpBackend, FtpParams};

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Retries after the initial attempt; 11 attempts total.
pub const MAX_SEND_RETRIES: u32 = 10;

/// Delivery errors.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Email build error: {0}")]
    Email(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Backend configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SendError>;

/// One delivery mechanism.
pub trait SendBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human-readable destination recorded in the processed-file ledger.
    fn destination(&self) -> String;

    /// Whether failed attempts wait quadratically (attempt² seconds) before
    /// retrying. Network backends opt in; local copy retries immediately.
    fn uses_backoff(&self) -> bool {
        false
    }

    /// Perform exactly one delivery attempt.
    fn send_once(&self, file: &Path) -> Result<()>;

    /// Deliver with the shared retry policy.
    fn send(&self, file: &Path) -> Result<()> {
        send_with_retry(self, file)
    }
}

/// Retry wrapper shared by all backends.
///
/// Retries [`MAX_SEND_RETRIES`] times; the final error is propagated to the
/// caller unchanged.
pub fn send_with_retry<B: SendBackend + ?Sized>(backend: &B, file: &Path) -> Result<()> {
    let mut attempt = 0u32;
    loop {
        match backend.send_once(file) {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempt += 1;
                if attempt > MAX_SEND_RETRIES {
                    return Err(err);
                }
                warn!(
                    backend = backend.name(),
                    attempt,
                    error = %err,
                    "Send attempt failed, retrying"
                );
                if backend.uses_backoff() {
                    std::thread::sleep(Duration::from_secs(u64::from(attempt * attempt)));
                }
            }
        }
    }
}

/// Result of one backend's delivery of one file.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub backend: &'static str,
    pub destination: String,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Fans one output file out across the enabled backends.
pub struct SendManager {
    backends: Vec<Box<dyn SendBackend>>,
}

impl SendManager {
    pub fn new(backends: Vec<Box<dyn SendBackend>>) -> Self {
        Self { backends }
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Deliver `file` through every backend, collecting per-backend results.
    /// Backends run even when an earlier one failed, so the error report
    /// covers all of them.
    pub fn send_all(&self, file: &Path) -> Vec<SendOutcome> {
        let mut outcomes = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let outcome = match backend.send(file) {
                Ok(()) => {
                    info!(
                        backend = backend.name(),
                        file = %file.display(),
                        destination = %backend.destination(),
                        "Delivered"
                    );
                    SendOutcome {
                        backend: backend.name(),
                        destination: backend.destination(),
                        success: true,
                        error_message: None,
                    }
                }
                Err(err) => SendOutcome {
                    backend: backend.name(),
                    destination: backend.destination(),
                    success: false,
                    error_message: Some(err.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Whether every backend succeeded (vacuously true for no backends).
pub fn all_succeeded(outcomes: &[SendOutcome]) -> bool {
    outcomes.iter().all(|o| o.success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingBackend {
        attempts: AtomicU32,
    }

    impl SendBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn destination(&self) -> String {
            "nowhere".to_string()
        }

        fn send_once(&self, _file: &Path) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SendError::Config("always fails".to_string()))
        }
    }

    struct FlakyBackend {
        attempts: AtomicU32,
        succeed_on: u32,
    }

    impl SendBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn destination(&self) -> String {
            "eventually".to_string()
        }

        fn send_once(&self, _file: &Path) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.succeed_on {
                Ok(())
            } else {
                Err(SendError::Config("transient".to_string()))
            }
        }
    }

    #[test]
    fn persistent_failure_is_attempted_eleven_times() {
        let backend = FailingBackend {
            attempts: AtomicU32::new(0),
        };
        let err = backend.send(Path::new("/tmp/f")).unwrap_err();
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 11);
        assert!(matches!(err, SendError::Config(_)));
    }

    #[test]
    fn transient_failure_recovers() {
        let backend = FlakyBackend {
            attempts: AtomicU32::new(0),
            succeed_on: 3,
        };
        backend.send(Path::new("/tmp/f")).unwrap();
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn manager_reports_per_backend_outcomes() {
        let manager = SendManager::new(vec![
            Box::new(FlakyBackend {
                attempts: AtomicU32::new(0),
                succeed_on: 1,
            }),
            Box::new(FailingBackend {
                attempts: AtomicU32::new(0),
            }),
        ]);

        let outcomes = manager.send_all(Path::new("/tmp/f"));
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[1].error_message.as_deref().unwrap().contains("always fails"));
        assert!(!all_succeeded(&outcomes));
    }

    #[test]
    fn empty_manager_vacuously_succeeds() {
        let manager = SendManager::new(Vec::new());
        assert!(manager.is_empty());
        assert!(all_succeeded(&manager.send_all(Path::new("/tmp/f"))));
    }
}
