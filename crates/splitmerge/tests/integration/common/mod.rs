//! Shared helpers for integration tests.
//!
//! PDF fixtures are generated in code. Every page carries its identity in the
//! width of its media box: `1000 * marker + page`, so the page order of a
//! built file can be read back without rendering anything.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use tempfile::TempDir;

use splitmerge::dispatch::{
    BatchCallback, BatchCompletion, BatchHandle, BatchReport, ConsumeReceipt, ConsumeRequest,
    FollowUp, IngestionDispatcher, PendingTask, TaskId, TaskOutcome,
};
use splitmerge::store::{Document as Record, DocumentId, InMemoryStore, PDF_MIME_TYPE};

/// Options for a generated PDF.
pub struct PdfSpec {
    pub marker: u64,
    pub pages: u32,
    pub version: &'static str,
    pub info: Option<Dictionary>,
}

impl PdfSpec {
    pub fn new(marker: u64, pages: u32) -> Self {
        Self {
            marker,
            pages,
            version: "1.4",
            info: None,
        }
    }

    pub fn version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    pub fn info(mut self, info: Dictionary) -> Self {
        self.info = Some(info);
        self
    }
}

/// Write a PDF whose pages each own a content stream and an image.
pub fn write_pdf(path: &Path, spec: &PdfSpec) {
    let mut doc = Document::with_version(spec.version);
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (1..=spec.pages)
        .map(|page| {
            let width = (1000 * spec.marker + u64::from(page)) as i64;
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 1,
                    "Height" => 1,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                vec![page as u8; 64],
            ));
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                b"q 10 0 0 10 0 0 cm /Im0 Do Q".to_vec(),
            ));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), 842.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => spec.pages as i64,
        }
        .into(),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    if let Some(info) = &spec.info {
        let info_id = doc.add_object(info.clone());
        doc.trailer.set("Info", info_id);
    }

    doc.save(path).unwrap();
}

/// `(marker, page)` of every page of a built file, in page order.
pub fn page_markers(path: &Path) -> Vec<(u64, u32)> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let width = page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                .as_i64()
                .unwrap() as u64;
            (width / 1000, (width % 1000) as u32)
        })
        .collect()
}

/// Number of image objects in a file.
pub fn image_count(path: &Path) -> usize {
    let doc = Document::load(path).unwrap();
    doc.objects
        .values()
        .filter(|object| {
            object
                .as_stream()
                .ok()
                .and_then(|s| s.dict.get(b"Subtype").ok())
                .and_then(|s| s.as_name().ok())
                == Some(b"Image".as_slice())
        })
        .count()
}

/// A stored PDF document record.
pub fn record(id: DocumentId, path: PathBuf) -> Record {
    Record {
        id,
        mime_type: PDF_MIME_TYPE.to_string(),
        source_path: path,
        archive_path: None,
        title: format!("Document {id}"),
        created: format!("2020-01-{:02}T08:00:00Z", id.min(28)).parse().unwrap(),
        correspondent: None,
        document_type: None,
        tags: Vec::new(),
    }
}

/// Temporary document library with a scratch directory.
pub struct Library {
    pub dir: TempDir,
    pub scratch: PathBuf,
    pub store: Arc<InMemoryStore>,
}

impl Library {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();
        Self {
            dir,
            scratch,
            store: Arc::new(InMemoryStore::new()),
        }
    }

    /// Store a generated PDF as document `id` (its pages marked with `id`).
    pub fn add(&self, id: DocumentId, pages: u32) -> Record {
        self.add_spec(id, &PdfSpec::new(id, pages))
    }

    pub fn add_spec(&self, id: DocumentId, spec: &PdfSpec) -> Record {
        let path = self.dir.path().join(format!("doc-{id}.pdf"));
        write_pdf(&path, spec);
        let record = record(id, path);
        self.store.insert(record.clone());
        record
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.scratch)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }
}

/// Records every call and completes batches only when told to.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub submitted: Mutex<Vec<ConsumeRequest>>,
    pub batches: Mutex<Vec<Vec<TaskId>>>,
    registered: AtomicUsize,
    completions: Mutex<Vec<BatchCompletion>>,
    callbacks: Mutex<Vec<BatchCallback>>,
    next_task: AtomicU64,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total number of calls of any dispatcher method.
    pub fn calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
            + self.batches.lock().unwrap().len()
            + self.registered.load(Ordering::SeqCst)
    }

    pub fn callbacks_registered(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    /// Complete every open batch, failing the tasks at `failed` positions,
    /// and run the registered callbacks.
    pub fn finish_batches(&self, failed: &[usize]) {
        let batches = self.batches.lock().unwrap().clone();
        let completions: Vec<_> = self.completions.lock().unwrap().drain(..).collect();

        let mut reports = Vec::new();
        for (tasks, completion) in batches.iter().zip(completions) {
            let outcomes = tasks
                .iter()
                .enumerate()
                .map(|(position, id)| {
                    let outcome = if failed.contains(&position) {
                        TaskOutcome::Failed("rejected".to_string())
                    } else {
                        TaskOutcome::Succeeded(ConsumeReceipt {
                            stored_at: PathBuf::from(format!("stored-{}", id.0)),
                            document_id: None,
                        })
                    };
                    (*id, outcome)
                })
                .collect();
            let report = BatchReport { outcomes };
            completion.complete(report.clone());
            reports.push(report);
        }

        let callbacks: Vec<_> = self.callbacks.lock().unwrap().drain(..).collect();
        for (callback, report) in callbacks.into_iter().zip(reports.iter().cycle()) {
            callback(report);
        }
    }
}

impl IngestionDispatcher for RecordingDispatcher {
    fn submit(&self, request: ConsumeRequest) -> PendingTask {
        self.submitted.lock().unwrap().push(request.clone());
        PendingTask {
            id: TaskId(self.next_task.fetch_add(1, Ordering::SeqCst)),
            request,
        }
    }

    fn submit_batch(&self, tasks: Vec<PendingTask>) -> splitmerge::Result<BatchHandle> {
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        let mut batches = self.batches.lock().unwrap();
        batches.push(ids.clone());
        let (handle, completion) = BatchHandle::new(batches.len() as u64, ids);
        self.completions.lock().unwrap().push(completion);
        Ok(handle)
    }

    fn on_batch_complete(
        &self,
        _batch: &BatchHandle,
        callback: BatchCallback,
    ) -> splitmerge::Result<FollowUp> {
        self.registered.fetch_add(1, Ordering::SeqCst);
        self.callbacks.lock().unwrap().push(callback);
        Ok(FollowUp::finished())
    }
}
