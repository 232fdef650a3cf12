//! FTP delivery backend.

use crate::{Result, SendBackend, SendError};
use std::fs::File;
use std::path::Path;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::debug;

/// FTP connection parameters from the folder config.
#[derive(Debug, Clone)]
pub struct FtpParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Remote directory; empty means the login directory.
    pub folder: String,
}

/// Uploads the output file with a binary STOR.
pub struct FtpBackend {
    params: FtpParams,
    output_name: String,
}

impl FtpBackend {
    pub fn new(params: FtpParams, output_name: impl Into<String>) -> Self {
        Self {
            params,
            output_name: output_name.into(),
        }
    }
}

impl SendBackend for FtpBackend {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn destination(&self) -> String {
        if self.params.folder.is_empty() {
            format!("ftp://{}:{}", self.params.host, self.params.port)
        } else {
            format!(
                "ftp://{}:{}/{}",
                self.params.host, self.params.port, self.params.folder
            )
        }
    }

    fn uses_backoff(&self) -> bool {
        true
    }

    fn send_once(&self, file: &Path) -> Result<()> {
        if self.params.host.is_empty() {
            return Err(SendError::Config("FTP server not configured".to_string()));
        }

        let mut ftp = FtpStream::connect((self.params.host.as_str(), self.params.port))?;
        ftp.login(&self.params.user, &self.params.password)?;
        if !self.params.folder.is_empty() {
            ftp.cwd(&self.params.folder)?;
        }
        ftp.transfer_type(FileType::Binary)?;

        let mut reader = File::open(file)?;
        let bytes = ftp.put_file(&self.output_name, &mut reader)?;
        debug!(
            file = %file.display(),
            name = %self.output_name,
            bytes,
            "FTP upload complete"
        );

        let _ = ftp.quit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FtpParams {
        FtpParams {
            host: "ftp.example.com".to_string(),
            port: 21,
            user: "dispatch".to_string(),
            password: "secret".to_string(),
            folder: "inbound/invoices".to_string(),
        }
    }

    #[test]
    fn destination_includes_remote_folder() {
        let backend = FtpBackend::new(params(), "f.inv");
        assert_eq!(backend.destination(), "ftp://ftp.example.com:21/inbound/invoices");
        assert!(backend.uses_backoff());
    }

    #[test]
    fn unconfigured_host_is_a_config_error() {
        let mut p = params();
        p.host.clear();
        let backend = FtpBackend::new(p, "f.inv");
        let err = backend.send_once(Path::new("/tmp/f.inv")).unwrap_err();
        assert!(matches!(err, SendError::Config(_)));
    }
}
