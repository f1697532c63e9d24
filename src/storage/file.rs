//! File storage module
//!
//! Handles file I/O for the single output file of a download.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, error, info, trace};

use crate::error::TorrentError;

/// Pre-allocated output file written at absolute offsets
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    length: u64,
    file: fs::File,
}

impl OutputFile {
    /// Create the file (and its parent directories) with its final length
    pub async fn create(path: &Path, length: u64) -> Result<Self, TorrentError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating directory: {}", parent.display());
                fs::create_dir_all(parent).await.map_err(|e| {
                    error!("Failed to create directory '{}': {}", parent.display(), e);
                    TorrentError::storage_error_full("Failed to create directory", parent.display().to_string(), e.to_string())
                })?;
            }
        }

        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await
            .map_err(|e| {
                error!("Failed to create file '{}': {}", path.display(), e);
                TorrentError::storage_error_full("Failed to create file", path.display().to_string(), e.to_string())
            })?;

        file.set_len(length).await.map_err(|e| {
            error!("Failed to set file length for '{}': {}", path.display(), e);
            TorrentError::storage_error_full("Failed to set file length", path.display().to_string(), e.to_string())
        })?;

        info!("Allocated output file {} ({} bytes)", path.display(), length);
        Ok(Self {
            path: path.to_path_buf(),
            length,
            file,
        })
    }

    /// Write `data` at an absolute offset.
    ///
    /// Writes that would extend past the declared length are rejected.
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), TorrentError> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.length) {
            error!(
                "Write of {} bytes at offset {} exceeds file length {}",
                data.len(),
                offset,
                self.length
            );
            return Err(TorrentError::storage_error_full(
                "Write past end of file",
                self.path.display().to_string(),
                format!("offset {} + {} bytes > {}", offset, data.len(), self.length),
            ));
        }

        trace!("Writing {} bytes at offset {}", data.len(), offset);
        self.file.seek(SeekFrom::Start(offset)).await.map_err(|e| {
            error!("Failed to seek in file '{}': {}", self.path.display(), e);
            TorrentError::storage_error_full("Failed to seek in file", self.path.display().to_string(), e.to_string())
        })?;
        self.file.write_all(data).await.map_err(|e| {
            error!("Failed to write to file '{}': {}", self.path.display(), e);
            TorrentError::storage_error_full("Failed to write to file", self.path.display().to_string(), e.to_string())
        })?;
        self.file.flush().await.map_err(|e| {
            error!("Failed to flush file '{}': {}", self.path.display(), e);
            TorrentError::storage_error_full("Failed to flush file", self.path.display().to_string(), e.to_string())
        })?;
        Ok(())
    }

    /// Flush file contents to disk
    pub async fn sync(&mut self) -> Result<(), TorrentError> {
        self.file.sync_all().await.map_err(|e| {
            error!("Failed to sync file '{}': {}", self.path.display(), e);
            TorrentError::storage_error_full("Failed to sync file", self.path.display().to_string(), e.to_string())
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn length(&self) -> u64 {
        self.length
    }
}
