//! A consumer that hands files to a consumption directory.
//!
//! Each ingested file is moved into the directory under its own name. A
//! sidecar `<name>.json` holding its [`Overrides`](crate::merge::metadata::Overrides)
//! is written first, so a watcher that sees the file can already read them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ConsumeReceipt, ConsumeRequest, Consumer};
use crate::error::{Result, SplitMergeError};

/// Extension appended to a file name for its sidecar.
pub const SIDECAR_EXTENSION: &str = "json";

/// Moves built files into a consumption directory.
#[derive(Debug, Clone)]
pub struct DirectoryConsumer {
    dir: PathBuf,
}

impl DirectoryConsumer {
    /// Create a consumer for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The consumption directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the sidecar written for `file`.
    pub fn sidecar_path(file: &Path) -> PathBuf {
        let mut name = file.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(SIDECAR_EXTENSION);
        file.with_file_name(name)
    }
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    // rename fails across file systems
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

#[async_trait]
impl Consumer for DirectoryConsumer {
    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeReceipt> {
        let name = request.file_path.file_name().ok_or_else(|| {
            SplitMergeError::dispatch_failed(format!(
                "Not a file: {}",
                request.file_path.display()
            ))
        })?;
        let stored_at = self.dir.join(name);

        let sidecar = Self::sidecar_path(&stored_at);
        let body = serde_json::to_vec_pretty(&request.overrides)
            .map_err(|e| SplitMergeError::dispatch_failed(format!("Failed to encode overrides: {e}")))?;
        tokio::fs::write(&sidecar, body)
            .await
            .map_err(|source| SplitMergeError::FailedToWrite {
                path: sidecar.clone(),
                source,
            })?;

        if let Err(source) = move_file(&request.file_path, &stored_at).await {
            if let Err(e) = tokio::fs::remove_file(&sidecar).await {
                debug!(sidecar = %sidecar.display(), error = %e, "could not remove orphaned sidecar");
            }
            return Err(SplitMergeError::FailedToWrite {
                path: stored_at,
                source,
            });
        }

        debug!(
            file = %stored_at.display(),
            sidecar = %sidecar.display(),
            "handed file to consumption directory"
        );

        Ok(ConsumeReceipt {
            stored_at,
            document_id: None,
        })
    }
}
