//! Open source documents, shared across the targets of one plan execution.
//!
//! A [`SourceHandleCache`] belongs to exactly one execution. Each document is
//! loaded the first time a target asks for it and reused afterwards; every
//! handle is released exactly once, either by [`SourceHandleCache::close_all`]
//! or when the cache is dropped.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::error::{PlanValidationError, Result};
use crate::io::reader::{LoadedPdf, PdfReader};
use crate::store::{Document, DocumentId};

/// An open source document.
pub type SourceHandle = LoadedPdf;

/// Counters describing cache use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Time spent loading documents.
    pub load_time: Duration,
    /// Documents loaded from disk.
    pub opened: usize,
    /// Requests answered from an already open handle.
    pub hits: usize,
    /// Handles released.
    pub closed: usize,
}

/// Map from document identity to its open handle.
#[derive(Debug)]
pub struct SourceHandleCache {
    reader: PdfReader,
    handles: HashMap<DocumentId, SourceHandle>,
    stats: CacheStatistics,
}

impl SourceHandleCache {
    /// Create an empty cache loading documents with `reader`.
    pub fn new(reader: PdfReader) -> Self {
        Self {
            reader,
            handles: HashMap::new(),
            stats: CacheStatistics::default(),
        }
    }

    /// Get the open handle for a document, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no PDF representation, its file
    /// is missing, or the file cannot be loaded.
    pub fn open(&mut self, document: &Document) -> Result<&SourceHandle> {
        if self.handles.contains_key(&document.id) {
            self.stats.hits += 1;
        } else {
            let path = document.pdf_path()?;
            if !path.exists() {
                return Err(PlanValidationError::SourceFileMissing {
                    document: document.id,
                    path: path.to_path_buf(),
                }
                .into());
            }

            let loaded = self.reader.load(path)?;
            debug!(
                document = document.id,
                path = %path.display(),
                pages = loaded.page_count(),
                version = %loaded.version,
                "opened source document"
            );
            self.stats.opened += 1;
            self.stats.load_time += loaded.load_time;
            self.handles.insert(document.id, loaded);
        }

        Ok(&self.handles[&document.id])
    }

    /// Whether a document is currently open.
    pub fn is_open(&self, id: DocumentId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handle is open.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Counters for this cache.
    pub fn statistics(&self) -> CacheStatistics {
        self.stats
    }

    /// Release every open handle and clear the cache. Safe to call again.
    pub fn close_all(&mut self) {
        for (id, handle) in self.handles.drain() {
            debug!(document = id, path = %handle.path.display(), "closed source document");
            drop(handle);
            self.stats.closed += 1;
        }
    }
}

impl Drop for SourceHandleCache {
    fn drop(&mut self) {
        self.close_all();
    }
}
