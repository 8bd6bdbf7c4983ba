//! Document records and the store they are looked up in.
//!
//! The executor only needs to find a document by id and, after a committed
//! run, delete the documents it consumed. [`DocumentStore`] is that seam.
//! [`InMemoryStore`] implements it over a JSON manifest, which is what the
//! command line front end uses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlanValidationError, Result, SplitMergeError};

/// Identity of a stored document.
pub type DocumentId = u64;

/// Identity of a correspondent.
pub type CorrespondentId = u64;

/// Identity of a document type.
pub type DocumentTypeId = u64;

/// Identity of a tag.
pub type TagId = u64;

/// MIME type of documents stored as PDF originals.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A stored document as the executor sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document identity.
    pub id: DocumentId,

    /// MIME type of the original file.
    pub mime_type: String,

    /// Path to the original file.
    pub source_path: PathBuf,

    /// Path to the archived PDF rendition, if one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,

    /// Display title.
    pub title: String,

    /// Creation timestamp.
    pub created: DateTime<Utc>,

    /// Assigned correspondent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correspondent: Option<CorrespondentId>,

    /// Assigned document type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentTypeId>,

    /// Assigned tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagId>,
}

impl Document {
    /// Whether an archived PDF rendition exists.
    pub fn has_archive_version(&self) -> bool {
        self.archive_path.is_some()
    }

    /// Resolve the file to read pages from.
    ///
    /// PDF originals are read directly; anything else falls back to the
    /// archived rendition.
    ///
    /// # Errors
    ///
    /// Returns [`PlanValidationError::NoPdfRepresentation`] when the original
    /// is not a PDF and no archive exists.
    pub fn pdf_path(&self) -> std::result::Result<&Path, PlanValidationError> {
        if self.mime_type == PDF_MIME_TYPE {
            Ok(&self.source_path)
        } else if let Some(archive) = &self.archive_path {
            Ok(archive)
        } else {
            Err(PlanValidationError::NoPdfRepresentation { document: self.id })
        }
    }
}

/// Lookup and removal of stored documents.
pub trait DocumentStore: Send + Sync {
    /// Find a document by id.
    fn find_document(&self, id: DocumentId) -> Option<Document>;

    /// Delete documents by id, returning how many were removed.
    ///
    /// Unknown ids are ignored.
    fn delete_documents(&self, ids: &[DocumentId]) -> Result<usize>;
}

/// A document store held in memory, optionally backed by a JSON manifest.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<BTreeMap<DocumentId, Document>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from document records. Later duplicates win.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let documents = documents.into_iter().map(|doc| (doc.id, doc)).collect();
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Load a store from a JSON manifest (an array of document records).
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .map_err(|err| SplitMergeError::invalid_manifest(path.to_path_buf(), err.to_string()))?;
        let documents: Vec<Document> = serde_json::from_slice(&raw)
            .map_err(|err| SplitMergeError::invalid_manifest(path.to_path_buf(), err.to_string()))?;
        Ok(Self::from_documents(documents))
    }

    /// Write the current records back to a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_vec_pretty(&self.documents())
            .map_err(|err| SplitMergeError::invalid_manifest(path.to_path_buf(), err.to_string()))?;
        std::fs::write(path, raw).map_err(|source| SplitMergeError::FailedToWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Insert or replace a document record.
    pub fn insert(&self, document: Document) {
        self.write().insert(document.id, document);
    }

    /// All records, ordered by id.
    pub fn documents(&self) -> Vec<Document> {
        self.read().values().cloned().collect()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<DocumentId, Document>> {
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<DocumentId, Document>> {
        self.documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for InMemoryStore {
    fn find_document(&self, id: DocumentId) -> Option<Document> {
        self.read().get(&id).cloned()
    }

    fn delete_documents(&self, ids: &[DocumentId]) -> Result<usize> {
        let mut documents = self.write();
        Ok(ids.iter().filter(|id| documents.remove(id).is_some()).count())
    }
}
