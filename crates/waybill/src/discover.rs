//! File discovery and folder transports.
//!
//! Discovery lists regular files directly under a folder as absolute paths.
//! Local, SMB and SFTP targets are locally visible (mounted) directories;
//! FTP targets are staged into a per-folder scratch directory first, after
//! which the pipeline treats the staging directory as the folder.

use crate::error::{DispatchError, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use suppaftp::FtpStream;
use tracing::{debug, info};
use walkdir::WalkDir;
use waybill_db::{ConnectionType, FolderConfig};

/// List regular files directly under `folder`, sorted by name.
pub fn discover_files(folder: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(folder = %folder.display(), count = files.len(), "Folder listed");
    Ok(files)
}

/// Resolve the directory discovery should list for a folder config.
///
/// Returns `Ok(None)` when a locally visible target no longer exists, which
/// the coordinator turns into the disable transition.
pub fn resolve_folder_target(
    config: &FolderConfig,
    scratch_dir: &Path,
) -> Result<Option<PathBuf>> {
    match config.connection_type {
        ConnectionType::Local | ConnectionType::Smb | ConnectionType::Sftp => {
            let path = PathBuf::from(&config.folder_name);
            if path.is_dir() {
                Ok(Some(path))
            } else {
                Ok(None)
            }
        }
        ConnectionType::Ftp => stage_ftp_folder(config, scratch_dir).map(Some),
    }
}

/// Download every file in the folder's FTP directory into a staging area.
fn stage_ftp_folder(config: &FolderConfig, scratch_dir: &Path) -> Result<PathBuf> {
    let staging = scratch_dir.join("staging").join(&config.alias);
    std::fs::create_dir_all(&staging)?;

    let mut ftp = FtpStream::connect((config.ftp_server.as_str(), config.ftp_port))
        .map_err(|e| ftp_error(config, e))?;
    ftp.login(&config.ftp_user, &config.ftp_password)
        .map_err(|e| ftp_error(config, e))?;
    if !config.folder_name.is_empty() {
        ftp.cwd(&config.folder_name).map_err(|e| ftp_error(config, e))?;
    }

    let names = ftp.nlst(None).map_err(|e| ftp_error(config, e))?;
    let mut staged = 0usize;
    for name in names {
        // Listings can include directory entries; take plain names only.
        if name.ends_with('/') || name.contains('/') {
            continue;
        }
        let mut reader = ftp.retr_as_stream(&name).map_err(|e| ftp_error(config, e))?;
        let local_path = staging.join(&name);
        let mut local = File::create(&local_path)?;
        io::copy(&mut reader, &mut local)?;
        ftp.finalize_retr_stream(reader)
            .map_err(|e| ftp_error(config, e))?;
        staged += 1;
    }
    let _ = ftp.quit();

    info!(
        alias = %config.alias,
        server = %config.ftp_server,
        staged,
        "FTP folder staged"
    );
    Ok(staging)
}

fn ftp_error(config: &FolderConfig, err: suppaftp::FtpError) -> DispatchError {
    DispatchError::Config(format!(
        "FTP staging failed for folder '{}' ({}): {}",
        config.alias, config.ftp_server, err
    ))
}
