//! Local copy backend.

use crate::{Result, SendBackend, SendError};
use std::fs;
use std::path::{Path, PathBuf};

/// Copies the output file into a destination directory under its delivery
/// name. The destination must already exist; it is typically a mounted
/// outbound share, and a missing mount is a delivery failure.
pub struct CopyBackend {
    destination_dir: PathBuf,
    output_name: String,
}

impl CopyBackend {
    pub fn new(destination_dir: impl Into<PathBuf>, output_name: impl Into<String>) -> Self {
        Self {
            destination_dir: destination_dir.into(),
            output_name: output_name.into(),
        }
    }
}

impl SendBackend for CopyBackend {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn destination(&self) -> String {
        self.destination_dir.display().to_string()
    }

    fn send_once(&self, file: &Path) -> Result<()> {
        if !self.destination_dir.is_dir() {
            return Err(SendError::Config(format!(
                "copy destination {} does not exist",
                self.destination_dir.display()
            )));
        }
        let target = self.destination_dir.join(&self.output_name);
        fs::copy(file, &target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_under_delivery_name() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("A_batch.inv");
        fs::write(&src, "A123\r\n").unwrap();

        let backend = CopyBackend::new(dst_dir.path(), "20260401_A_batch.inv");
        backend.send(&src).unwrap();

        let delivered = dst_dir.path().join("20260401_A_batch.inv");
        assert_eq!(fs::read_to_string(delivered).unwrap(), "A123\r\n");
    }

    #[test]
    fn missing_destination_is_an_error() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("f.inv");
        fs::write(&src, "A").unwrap();

        let backend = CopyBackend::new(src_dir.path().join("not-mounted"), "f.inv");
        assert!(backend.send_once(&src).is_err());
    }
}
