//! Assembly of one output document from pages of open sources.
//!
//! Pages are copied object by object. Every source gets its own id map, so an
//! object shared by several pages of one source (a font, an image) is copied
//! once per target, while objects of different sources never collide. The
//! same page may be appended more than once; each occurrence gets its own page
//! object sharing the copied resources.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

use crate::error::{Result, SplitMergeError};
use crate::io::reader::{LoadedPdf, PdfVersion};
use crate::store::DocumentId;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Bound on page tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

type IdMap = HashMap<ObjectId, ObjectId>;

/// An output document under construction.
///
/// Dropping a `TargetDocument` discards everything built so far.
#[derive(Debug)]
pub struct TargetDocument {
    document: Document,
    pages_id: ObjectId,
    version: PdfVersion,
    imported: HashMap<DocumentId, IdMap>,
}

impl TargetDocument {
    /// Start an empty document with a catalog and an empty page tree.
    pub fn new() -> Self {
        let version = PdfVersion::DEFAULT;
        let mut document = Document::with_version(version.to_string());

        let pages_id = document.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        Self {
            document,
            pages_id,
            version,
            imported: HashMap::new(),
        }
    }

    /// Lowest version compatible with everything appended so far.
    pub fn version(&self) -> PdfVersion {
        self.version
    }

    /// Raise the tracked version to at least `version`.
    pub fn require_version(&mut self, version: PdfVersion) {
        self.version = self.version.max(version);
    }

    /// The document being built.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the document being built.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Copy `object` from a source into this document, following references.
    ///
    /// References into the source's page tree are not followed; they resolve
    /// to pages of this document once those pages are appended.
    pub fn import(&mut self, source: DocumentId, from: &Document, object: &Object) -> Object {
        let ids = self.imported.entry(source).or_default();
        import_object(&mut self.document, from, object, ids)
    }

    /// Append page `page_id` of an open source at the end of the page tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the source page or this document's page tree is
    /// malformed.
    pub fn append_page(
        &mut self,
        source: DocumentId,
        from: &LoadedPdf,
        page_id: ObjectId,
    ) -> Result<ObjectId> {
        let mut page = page_with_inherited_attributes(&from.document, page_id)?;
        page.remove(b"Parent");

        let ids = self.imported.entry(source).or_default();

        // A link on an earlier page may already point here through a placeholder.
        let new_page_id = match ids.get(&page_id) {
            Some(id) if matches!(self.document.objects.get(id), Some(Object::Null)) => *id,
            _ => self.document.new_object_id(),
        };
        ids.entry(page_id).or_insert(new_page_id);

        let mut page = import_dictionary(&mut self.document, &from.document, &page, ids);
        page.set("Parent", self.pages_id);
        self.document
            .objects
            .insert(new_page_id, Object::Dictionary(page));

        self.push_kid(new_page_id)?;
        Ok(new_page_id)
    }

    /// Drop every object no longer reachable from the trailer.
    ///
    /// Returns how many objects were removed.
    pub fn strip_unreferenced(&mut self) -> usize {
        self.document.prune_objects().len()
    }

    /// Finish building, returning the document and its minimum version.
    pub fn into_parts(self) -> (Document, PdfVersion) {
        (self.document, self.version)
    }

    fn push_kid(&mut self, page_id: ObjectId) -> Result<()> {
        let pages = self
            .document
            .get_object_mut(self.pages_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| SplitMergeError::malformed(format!("Failed to get pages object: {e}")))?;

        match pages.get_mut(b"Kids") {
            Ok(Object::Array(kids)) => kids.push(Object::Reference(page_id)),
            _ => return Err(SplitMergeError::malformed("Kids is not an array")),
        }

        let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        pages.set("Count", Object::Integer(count + 1));
        Ok(())
    }
}

impl Default for TargetDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Clone a page dictionary, filling in attributes it inherits from ancestors.
fn page_with_inherited_attributes(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| SplitMergeError::malformed(format!("Failed to get page {page_id:?}: {e}")))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent
        && depth < MAX_TREE_DEPTH
    {
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE_ATTRIBUTES {
            if !page.has(key)
                && let Ok(value) = node.get(key)
            {
                page.set(key, value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    Ok(page)
}

fn is_page_tree_node(object: &Object) -> bool {
    object
        .as_dict()
        .and_then(|dict| dict.get(b"Type"))
        .and_then(Object::as_name)
        .is_ok_and(|name| name == b"Page" || name == b"Pages")
}

fn import_object(target: &mut Document, source: &Document, object: &Object, ids: &mut IdMap) -> Object {
    match object {
        Object::Reference(id) => Object::Reference(import_reference(target, source, *id, ids)),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| import_object(target, source, item, ids))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(import_dictionary(target, source, dict, ids)),
        Object::Stream(stream) => {
            let mut stream = stream.clone();
            stream.dict = import_dictionary(target, source, &stream.dict, ids);
            Object::Stream(stream)
        }
        other => other.clone(),
    }
}

fn import_dictionary(
    target: &mut Document,
    source: &Document,
    dict: &Dictionary,
    ids: &mut IdMap,
) -> Dictionary {
    let mut imported = Dictionary::new();
    for (key, value) in dict.iter() {
        imported.set(key.clone(), import_object(target, source, value, ids));
    }
    imported
}

fn import_reference(
    target: &mut Document,
    source: &Document,
    id: ObjectId,
    ids: &mut IdMap,
) -> ObjectId {
    if let Some(mapped) = ids.get(&id) {
        return *mapped;
    }

    // Registered before recursing so reference cycles terminate.
    let new_id = target.new_object_id();
    ids.insert(id, new_id);

    let imported = match source.get_object(id) {
        Ok(object) if is_page_tree_node(object) => Object::Null,
        Ok(object) => import_object(target, source, object, ids),
        Err(_) => Object::Null,
    };
    target.objects.insert(new_id, imported);
    new_id
}
