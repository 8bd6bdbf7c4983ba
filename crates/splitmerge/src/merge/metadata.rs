//! Metadata carried from a source into a built target.
//!
//! Two kinds of metadata are handled here:
//! - descriptive PDF properties (the Info dictionary and the catalog's XMP
//!   stream), copied into the output file itself
//! - business fields of the stored document (date, correspondent, document
//!   type, tags), recorded as [`Overrides`] for ingestion

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MetadataPolicy;
use crate::error::{Result, SplitMergeError};
use crate::io::reader::LoadedPdf;
use crate::merge::target::TargetDocument;
use crate::store::{CorrespondentId, Document as StoredDocument, DocumentId, DocumentTypeId, TagId};

/// Values ingestion applies to the document created from a built target.
///
/// Unset fields are left for ingestion to derive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// Title of the new document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Creation date of the new document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Correspondent of the new document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correspondent: Option<CorrespondentId>,

    /// Document type of the new document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentTypeId>,

    /// Tags of the new document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<TagId>>,
}

impl Overrides {
    /// Whether any business field beyond title and date is set.
    pub fn has_classification(&self) -> bool {
        self.correspondent.is_some() || self.document_type.is_some() || self.tags.is_some()
    }
}

/// Applies a [`MetadataPolicy`] to the first source of each target.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataMerger {
    policy: MetadataPolicy,
}

impl MetadataMerger {
    /// Create a merger for `policy`.
    pub fn new(policy: MetadataPolicy) -> Self {
        Self { policy }
    }

    /// The policy in effect.
    pub fn policy(&self) -> MetadataPolicy {
        self.policy
    }

    /// Copy descriptive properties of `source` into `target`.
    ///
    /// Info entries are copied key by key. An entry whose value is not a
    /// plain string, name, number or boolean cannot be carried over; it is
    /// skipped and described in the returned warnings. The catalog's XMP
    /// metadata stream is copied as is.
    ///
    /// # Errors
    ///
    /// Returns an error only if the target document itself is malformed.
    pub fn copy_pdf_properties(
        &self,
        source_id: DocumentId,
        source: &LoadedPdf,
        target: &mut TargetDocument,
    ) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if let Some(info) = info_dictionary(&source.document) {
            let mut copied = Dictionary::new();
            for (key, value) in info.iter() {
                let value = resolve(&source.document, value);
                if is_representable(value) {
                    copied.set(key.clone(), value.clone());
                } else {
                    let message = format!(
                        "skipped metadata key {} of document {source_id}: unsupported {} value",
                        String::from_utf8_lossy(key),
                        value.enum_variant()
                    );
                    warn!(document = source_id, key = %String::from_utf8_lossy(key), "{message}");
                    warnings.push(message);
                }
            }

            let doc = target.document_mut();
            let target_info = target_info_mut(doc)?;
            for (key, value) in copied.iter() {
                target_info.set(key.clone(), value.clone());
            }
        }

        if let Some(xmp) = catalog(&source.document).and_then(|c| c.get(b"Metadata").ok()) {
            let xmp = xmp.clone();
            let imported = target.import(source_id, &source.document, &xmp);
            target_catalog_mut(target.document_mut())?.set("Metadata", imported);
            debug!(document = source_id, "copied XMP metadata");
        }

        Ok(warnings)
    }

    /// Record business fields of the first source of a target.
    ///
    /// The creation date is always taken from `source`. Correspondent,
    /// document type and tags are copied only under
    /// [`MetadataPolicy::CopyFirst`], and only those the source has.
    pub fn copy_document_fields(&self, source: &StoredDocument, overrides: &mut Overrides) {
        overrides.created = Some(source.created);

        if self.policy != MetadataPolicy::CopyFirst {
            return;
        }

        if let Some(correspondent) = source.correspondent {
            overrides.correspondent = Some(correspondent);
        }
        if let Some(document_type) = source.document_type {
            overrides.document_type = Some(document_type);
        }
        if !source.tags.is_empty() {
            overrides.tags = Some(source.tags.iter().copied().collect());
        }
    }
}

fn resolve<'a>(doc: &'a Document, value: &'a Object) -> &'a Object {
    match value {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(value),
        _ => value,
    }
}

fn is_representable(value: &Object) -> bool {
    matches!(
        value,
        Object::String(..) | Object::Name(_) | Object::Integer(_) | Object::Real(_) | Object::Boolean(_)
    )
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn catalog(doc: &Document) -> Option<&Dictionary> {
    let root = doc.trailer.get(b"Root").and_then(Object::as_reference).ok()?;
    doc.get_dictionary(root).ok()
}

fn target_catalog_mut(doc: &mut Document) -> Result<&mut Dictionary> {
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| SplitMergeError::malformed(format!("Missing catalog: {e}")))?;
    doc.get_object_mut(root)
        .and_then(Object::as_dict_mut)
        .map_err(|e| SplitMergeError::malformed(format!("Invalid catalog: {e}")))
}

fn target_info_mut(doc: &mut Document) -> Result<&mut Dictionary> {
    let existing: Option<ObjectId> = doc.trailer.get(b"Info").and_then(Object::as_reference).ok();
    let info_id = match existing {
        Some(id) => id,
        None => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };

    doc.get_object_mut(info_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| SplitMergeError::malformed(format!("Invalid Info dictionary: {e}")))
}
