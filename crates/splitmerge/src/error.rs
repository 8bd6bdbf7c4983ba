//! Error types for splitmerge.
//!
//! Every failure that can abort a plan execution is a [`SplitMergeError`].
//! Problems with the plan itself (bad page ranges, unknown documents, missing
//! files) are grouped under [`PlanValidationError`] so callers can tell a
//! rejected plan apart from an I/O or PDF structure failure.
//!
//! # Error Categories
//!
//! - **Validation Errors**: the plan cannot be applied as written
//! - **PDF Errors**: a source could not be loaded, or its structure is broken
//! - **Output Errors**: a built target could not be persisted
//! - **Dispatch Errors**: the ingestion runner rejected or lost a batch

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::DocumentId;

/// Result type alias for splitmerge operations.
pub type Result<T> = std::result::Result<T, SplitMergeError>;

/// Reasons a plan is rejected.
///
/// The `Display` output of each variant is the human-readable message
/// reported to whoever submitted the plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanValidationError {
    /// A page selection does not follow the `N` / `A-B` grammar.
    #[error("invalid page range: {expression}")]
    InvalidPageRange {
        /// The complete expression as submitted.
        expression: String,
    },

    /// A requested page does not exist in its source.
    #[error("page {page} out of range (document {document} has {page_count} page(s))")]
    PageOutOfRange {
        /// Source document.
        document: DocumentId,
        /// Requested 1-based page number.
        page: u32,
        /// Pages available in the source.
        page_count: usize,
    },

    /// No document record exists for the id.
    #[error("document {id} does not exist")]
    DocumentNotFound {
        /// The unknown document id.
        id: DocumentId,
    },

    /// The document record points at a file that is gone.
    #[error("source file missing: {}", .path.display())]
    SourceFileMissing {
        /// Document whose file is missing.
        document: DocumentId,
        /// Path that was expected to exist.
        path: PathBuf,
    },

    /// Neither the original nor an archived version of the document is a PDF.
    #[error("document has no PDF representation (document {document})")]
    NoPdfRepresentation {
        /// Document lacking a PDF.
        document: DocumentId,
    },

    /// The plan has no targets at all.
    #[error("plan contains no targets")]
    EmptyPlan,

    /// A target lists no sources.
    #[error("target {index} has no sources")]
    EmptyTarget {
        /// Zero-based index of the target within the plan.
        index: usize,
    },
}

/// Main error type for splitmerge operations.
#[derive(Debug, Error)]
pub enum SplitMergeError {
    /// The plan cannot be applied.
    #[error(transparent)]
    Validation(#[from] PlanValidationError),

    /// A source PDF could not be parsed.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", .path.display())]
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// A source PDF is encrypted.
    #[error(
        "PDF is encrypted and cannot be processed: {}\n  \
         Hint: Decrypt the PDF first using 'qpdf --decrypt' or similar tools",
        .path.display()
    )]
    EncryptedPdf {
        /// Path to the encrypted PDF.
        path: PathBuf,
    },

    /// The object structure of a PDF is not what the page tree requires.
    #[error("Malformed PDF structure: {reason}")]
    MalformedPdf {
        /// Details about the problem.
        reason: String,
    },

    /// A built target could not be created in the scratch directory.
    #[error("Failed to create output file in {}\n  Reason: {source}", .dir.display())]
    FailedToCreateOutput {
        /// Scratch directory.
        dir: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A built target could not be written.
    #[error("Failed to write output file: {}\n  Reason: {source}", .path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The ingestion runner could not accept or complete a batch.
    #[error("Dispatch failed: {reason}")]
    DispatchFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// A document manifest could not be read or written.
    #[error("Invalid document manifest: {}\n  Reason: {reason}", .path.display())]
    InvalidManifest {
        /// Path to the manifest.
        path: PathBuf,
        /// Details about the failure.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
}

impl From<lopdf::Error> for SplitMergeError {
    fn from(err: lopdf::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

impl From<anyhow::Error> for SplitMergeError {
    fn from(err: anyhow::Error) -> Self {
        Self::invalid_config(format!("{err:#}"))
    }
}

impl SplitMergeError {
    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path,
            reason: reason.into(),
        }
    }

    /// Create an EncryptedPdf error.
    pub fn encrypted_pdf(path: PathBuf) -> Self {
        Self::EncryptedPdf { path }
    }

    /// Create a MalformedPdf error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPdf {
            reason: reason.into(),
        }
    }

    /// Create a DispatchFailed error.
    pub fn dispatch_failed(reason: impl Into<String>) -> Self {
        Self::DispatchFailed {
            reason: reason.into(),
        }
    }

    /// Create an InvalidManifest error.
    pub fn invalid_manifest(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path,
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// The validation failure behind this error, if the plan was rejected.
    pub fn as_validation(&self) -> Option<&PlanValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Check if this error means the plan itself was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 1,
            Self::InvalidConfig { .. } => 1,
            Self::InvalidManifest { .. } => 2,
            Self::FailedToLoadPdf { .. } => 3,
            Self::EncryptedPdf { .. } => 3,
            Self::MalformedPdf { .. } => 3,
            Self::FailedToCreateOutput { .. } => 5,
            Self::FailedToWrite { .. } => 5,
            Self::Io { .. } => 5,
            Self::DispatchFailed { .. } => 6,
        }
    }
}
