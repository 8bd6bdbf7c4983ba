//! PDF loading.
//!
//! Loading is synchronous: a plan execution is a blocking job and is expected
//! to run on a blocking thread (see `tokio::task::spawn_blocking`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use lopdf::{Document, ObjectId};

use crate::error::{Result, SplitMergeError};

/// A PDF header version such as `1.7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PdfVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl PdfVersion {
    /// Version written for new documents.
    pub const DEFAULT: PdfVersion = PdfVersion::new(1, 4);

    /// Create a version.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Version of a loaded document, or [`PdfVersion::DEFAULT`] if its header
    /// could not be read.
    pub fn of(doc: &Document) -> Self {
        doc.version.parse().unwrap_or(Self::DEFAULT)
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for PdfVersion {
    type Err = SplitMergeError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = s
            .trim()
            .split_once('.')
            .and_then(|(major, minor)| Some(Self::new(major.parse().ok()?, minor.parse().ok()?)));
        parsed.ok_or_else(|| SplitMergeError::malformed(format!("Invalid PDF version: {s}")))
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A loaded PDF with its page order resolved.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The PDF document.
    pub document: Document,

    /// Path to the source file.
    pub path: PathBuf,

    /// Page object ids in page order.
    pub pages: Vec<ObjectId>,

    /// Header version.
    pub version: PdfVersion,

    /// Time taken to load the document.
    pub load_time: Duration,
}

impl LoadedPdf {
    fn new(document: Document, path: PathBuf, load_time: Duration) -> Self {
        // get_pages is keyed by 1-based page number, so values come out in page order
        let pages = document.get_pages().into_values().collect();
        let version = PdfVersion::of(&document);

        Self {
            document,
            path,
            pages,
            version,
            load_time,
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Object id of a 1-based page number.
    pub fn page_id(&self, page: u32) -> Option<ObjectId> {
        let index = usize::try_from(page).ok()?.checked_sub(1)?;
        self.pages.get(index).copied()
    }
}

/// PDF reader.
#[derive(Debug, Clone, Default)]
pub struct PdfReader;

impl PdfReader {
    /// Create a new PDF reader.
    pub fn new() -> Self {
        Self
    }

    /// Load a single PDF document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - File is not a valid PDF
    /// - PDF is encrypted
    pub fn load(&self, path: &Path) -> Result<LoadedPdf> {
        let path_buf = path.to_path_buf();
        let start = Instant::now();

        let doc = Document::load(&path_buf).map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("encrypt") || err_msg.contains("password") {
                SplitMergeError::encrypted_pdf(path_buf.clone())
            } else {
                SplitMergeError::failed_to_load_pdf(path_buf.clone(), err_msg)
            }
        })?;

        if doc.is_encrypted() {
            return Err(SplitMergeError::encrypted_pdf(path_buf));
        }

        Ok(LoadedPdf::new(doc, path_buf, start.elapsed()))
    }
}
