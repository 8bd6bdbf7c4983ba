//! Persisting built targets.
//!
//! Every target is written to a fresh, uniquely named file in the scratch
//! directory. The file is created exclusively, so concurrent executions
//! sharing a scratch directory never clobber each other's output.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use lopdf::Document;

use crate::error::{Result, SplitMergeError};
use crate::io::reader::PdfVersion;

/// Prefix of generated output file names.
pub const OUTPUT_PREFIX: &str = "merge_";

/// Suffix of generated output file names.
pub const OUTPUT_SUFFIX: &str = ".pdf";

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Compress streams that carry no filter yet.
    pub compress: bool,

    /// Buffer size for writing (in bytes).
    pub buffer_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compress: true,
            buffer_size: 8192,
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Path the file was written to.
    pub output_path: PathBuf,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Version written to the header.
    pub version: PdfVersion,

    /// Time taken to write the file.
    pub write_time: Duration,
}

/// PDF writer with configurable behavior.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a new PDF writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with custom options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Create a writer without compression (faster but larger files).
    pub fn without_compression() -> Self {
        Self::with_options(WriteOptions {
            compress: false,
            ..Default::default()
        })
    }

    /// Write `doc` to a new file in `dir`, declaring `version` in the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written. A file that
    /// was created but not completely written is removed.
    pub fn persist(
        &self,
        doc: &mut Document,
        dir: &Path,
        version: PdfVersion,
    ) -> Result<WriteStatistics> {
        let start = Instant::now();

        doc.version = version.to_string();
        if self.options.compress {
            doc.compress();
        }

        let file = tempfile::Builder::new()
            .prefix(OUTPUT_PREFIX)
            .suffix(OUTPUT_SUFFIX)
            .tempfile_in(dir)
            .map_err(|source| SplitMergeError::FailedToCreateOutput {
                dir: dir.to_path_buf(),
                source,
            })?;
        let output_path = file.path().to_path_buf();

        let mut writer = std::io::BufWriter::with_capacity(self.options.buffer_size, file.as_file());
        doc.save_to(&mut writer)
            .map_err(|e| SplitMergeError::FailedToWrite {
                path: output_path.clone(),
                source: std::io::Error::other(e),
            })?;
        writer.flush().map_err(|source| SplitMergeError::FailedToWrite {
            path: output_path.clone(),
            source,
        })?;
        drop(writer);

        // The named temp file deletes itself on drop; keeping it hands
        // ownership of the path to the caller.
        let (_, output_path) = file.keep().map_err(|e| SplitMergeError::FailedToWrite {
            path: output_path,
            source: e.error,
        })?;

        let file_size = std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);

        Ok(WriteStatistics {
            output_path,
            file_size,
            version,
            write_time: start.elapsed(),
        })
    }
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
