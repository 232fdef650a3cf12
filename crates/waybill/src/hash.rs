//! Content hashing with bounded retry.
//!
//! Files may still be mid-transfer from the upstream system when a run
//! starts; a short quadratic backoff absorbs the usual lock windows without
//! stalling the whole run on one file.

use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Total read attempts before the error propagates.
pub const MAX_HASH_ATTEMPTS: u32 = 5;

/// SHA-256 hex digest of a file's content, retrying transient read failures.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut attempt = 0u32;
    loop {
        match hash_once(path) {
            Ok(digest) => return Ok(digest),
            Err(err) => {
                attempt += 1;
                if attempt >= MAX_HASH_ATTEMPTS {
                    return Err(err);
                }
                warn!(
                    file = %path.display(),
                    attempt,
                    error = %err,
                    "File read failed, retrying"
                );
                std::thread::sleep(Duration::from_secs(u64::from(attempt * attempt)));
            }
        }
    }
}

fn hash_once(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_hashes_identically_regardless_of_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("invoice_a.edi");
        let b = dir.path().join("renamed_copy.edi");
        std::fs::write(&a, "A123456INV00001\r\n").unwrap();
        std::fs::write(&b, "A123456INV00001\r\n").unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn different_content_hashes_differently() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.edi");
        let b = dir.path().join("b.edi");
        std::fs::write(&a, "A1").unwrap();
        std::fs::write(&b, "A2").unwrap();

        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello world").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
