//! Plan execution.
//!
//! [`SplitMergeExecutor::execute`] builds every target of a plan, in plan
//! order, before anything is handed to ingestion. Any failure aborts the
//! whole plan: nothing is dispatched, files already built for earlier targets
//! are removed, and every open source is released.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{DeletionPolicy, ExecutionOptions};
use crate::dispatch::{
    BatchCallback, BatchHandle, BatchReport, ConsumeRequest, FollowUp, IngestionDispatcher,
    PendingTask,
};
use crate::error::{PlanValidationError, Result};
use crate::io::cache::{CacheStatistics, SourceHandleCache};
use crate::io::reader::{PdfReader, PdfVersion};
use crate::io::writer::{PdfWriter, format_file_size};
use crate::merge::metadata::{MetadataMerger, Overrides};
use crate::merge::pages::format_page_list;
use crate::merge::target::TargetDocument;
use crate::plan::{Plan, TargetSpec};
use crate::store::{DocumentId, DocumentStore};

/// A target written to the scratch directory.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTarget {
    /// The written file.
    pub output_path: PathBuf,

    /// Values for ingestion to apply.
    pub overrides: Overrides,

    /// Number of pages in the file.
    pub page_count: usize,

    /// Version declared in the file header.
    pub version: PdfVersion,

    /// Size of the file in bytes.
    pub file_size: u64,

    /// Time taken to write the file.
    pub write_time: Duration,

    /// Non-fatal problems met while building.
    pub warnings: Vec<String>,
}

/// Statistics about one plan execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStatistics {
    /// Number of targets written.
    pub targets_built: usize,

    /// Pages written across all targets.
    pub pages_written: usize,

    /// Source documents loaded from disk.
    pub sources_opened: usize,

    /// Source requests answered by an already open document.
    pub cache_hits: usize,

    /// Source documents released.
    pub handles_closed: usize,

    /// Time spent loading source documents.
    pub load_time: Duration,

    /// Time spent writing targets.
    pub write_time: Duration,

    /// Time taken to build every target.
    pub build_time: Duration,
}

/// What was handed to ingestion.
#[derive(Debug)]
pub struct Dispatch {
    /// The ingestion batch.
    pub batch: BatchHandle,

    /// Source deletion, when requested.
    pub cleanup: Option<FollowUp>,
}

/// Result of a plan execution.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Built targets, in plan order.
    pub targets: Vec<BuiltTarget>,

    /// `None` in preview mode.
    pub dispatch: Option<Dispatch>,

    /// Execution statistics.
    pub statistics: ExecutionStatistics,
}

impl ExecutionOutcome {
    /// Paths of the built files, in plan order.
    pub fn files(&self) -> Vec<&Path> {
        self.targets.iter().map(|t| t.output_path.as_path()).collect()
    }

    /// Whether the run only built files.
    pub fn is_preview(&self) -> bool {
        self.dispatch.is_none()
    }

    /// Warnings of every target.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.targets
            .iter()
            .flat_map(|t| t.warnings.iter().map(String::as_str))
    }
}

/// Executes split/merge plans against a document store.
pub struct SplitMergeExecutor {
    store: Arc<dyn DocumentStore>,
    dispatcher: Arc<dyn IngestionDispatcher>,
    reader: PdfReader,
    writer: PdfWriter,
}

impl SplitMergeExecutor {
    /// Create an executor resolving documents in `store` and handing built
    /// targets to `dispatcher`.
    pub fn new(store: Arc<dyn DocumentStore>, dispatcher: Arc<dyn IngestionDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            reader: PdfReader::new(),
            writer: PdfWriter::new(),
        }
    }

    /// Use `writer` to persist targets.
    pub fn with_writer(mut self, writer: PdfWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Build every target of `plan`, then dispatch them unless in preview.
    ///
    /// This blocks on file I/O. From async code, run it on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the options or plan are invalid, a document or
    /// page cannot be resolved, a source cannot be loaded, a target cannot be
    /// written, or dispatch fails. Errors met while building leave nothing
    /// dispatched. If the batch was submitted but source deletion could not
    /// be registered, the batch keeps running, the sources are kept, and the
    /// registration error is returned.
    pub fn execute(&self, plan: &Plan, options: &ExecutionOptions) -> Result<ExecutionOutcome> {
        let start = Instant::now();

        options.validate()?;
        plan.validate()?;

        let merger = MetadataMerger::new(options.metadata);
        debug!(
            targets = plan.targets.len(),
            policy = ?merger.policy(),
            scratch_dir = %options.scratch_dir.display(),
            "executing plan"
        );

        let (built, cache_stats) = self.build(plan, &merger, &options.scratch_dir);
        let targets = built?;

        let statistics = summarize(&targets, cache_stats, start.elapsed());

        if options.preview {
            info!(
                targets = targets.len(),
                pages = statistics.pages_written,
                "preview: built targets, nothing dispatched"
            );
            return Ok(ExecutionOutcome {
                targets,
                dispatch: None,
                statistics,
            });
        }

        let dispatch = self.dispatch(plan, options, &targets)?;
        Ok(ExecutionOutcome {
            targets,
            dispatch: Some(dispatch),
            statistics,
        })
    }

    /// Build every target with a cache private to this call, releasing all
    /// of its handles whether or not building succeeded.
    fn build(
        &self,
        plan: &Plan,
        merger: &MetadataMerger,
        scratch_dir: &Path,
    ) -> (Result<Vec<BuiltTarget>>, CacheStatistics) {
        let mut cache = SourceHandleCache::new(self.reader.clone());
        let built = self.build_all(plan, merger, &mut cache, scratch_dir);
        cache.close_all();
        (built, cache.statistics())
    }

    fn build_all(
        &self,
        plan: &Plan,
        merger: &MetadataMerger,
        cache: &mut SourceHandleCache,
        scratch_dir: &Path,
    ) -> Result<Vec<BuiltTarget>> {
        let mut targets = Vec::with_capacity(plan.targets.len());

        for (index, spec) in plan.targets.iter().enumerate() {
            match self.build_target(index, spec, merger, cache, scratch_dir) {
                Ok(built) => targets.push(built),
                Err(e) => {
                    warn!(target_index = index, error = %e, "aborting plan");
                    discard(&targets);
                    return Err(e);
                }
            }
        }

        Ok(targets)
    }

    fn build_target(
        &self,
        index: usize,
        spec: &TargetSpec,
        merger: &MetadataMerger,
        cache: &mut SourceHandleCache,
        scratch_dir: &Path,
    ) -> Result<BuiltTarget> {
        let mut target = TargetDocument::new();
        let mut overrides = Overrides::default();
        let mut warnings = Vec::new();

        for (position, source_spec) in spec.sources.iter().enumerate() {
            let id = source_spec.document;
            let record = self
                .store
                .find_document(id)
                .ok_or(PlanValidationError::DocumentNotFound { id })?;
            let source = cache.open(&record)?;
            target.require_version(source.version);

            let pages = source_spec
                .requested_pages()?
                .resolve(source.page_count())
                .map_err(|page| PlanValidationError::PageOutOfRange {
                    document: id,
                    page,
                    page_count: source.page_count(),
                })?;

            if position == 0 {
                overrides.title = Some(record.title.clone());
                warnings.extend(merger.copy_pdf_properties(id, source, &mut target)?);
                merger.copy_document_fields(&record, &mut overrides);
            }

            for &page in &pages {
                let page_id = source.page_id(page).ok_or(PlanValidationError::PageOutOfRange {
                    document: id,
                    page,
                    page_count: source.page_count(),
                })?;
                target.append_page(id, source, page_id)?;
            }

            debug!(
                target_index = index,
                document = id,
                pages = %format_page_list(&pages),
                "appended source pages"
            );
        }

        let removed = target.strip_unreferenced();
        let page_count = target.page_count();
        let (mut document, version) = target.into_parts();

        let written = self.writer.persist(&mut document, scratch_dir, version)?;
        drop(document);

        info!(
            target_index = index,
            file = %written.output_path.display(),
            pages = page_count,
            version = %version,
            size = %format_file_size(written.file_size),
            pruned = removed,
            write_ms = written.write_time.as_millis() as u64,
            "built target"
        );

        Ok(BuiltTarget {
            output_path: written.output_path,
            overrides,
            page_count,
            version,
            file_size: written.file_size,
            write_time: written.write_time,
            warnings,
        })
    }

    fn dispatch(
        &self,
        plan: &Plan,
        options: &ExecutionOptions,
        targets: &[BuiltTarget],
    ) -> Result<Dispatch> {
        let tasks: Vec<PendingTask> = targets
            .iter()
            .map(|target| {
                self.dispatcher.submit(ConsumeRequest {
                    file_path: target.output_path.clone(),
                    overrides: target.overrides.clone(),
                })
            })
            .collect();

        let batch = self.dispatcher.submit_batch(tasks)?;
        info!(batch = batch.id(), tasks = batch.tasks().len(), "dispatched targets for ingestion");

        let cleanup = if options.deletes_sources() {
            let documents: Vec<DocumentId> = plan.source_documents().into_iter().collect();
            let callback = delete_sources(Arc::clone(&self.store), documents, options.deletion_policy);
            Some(self.dispatcher.on_batch_complete(&batch, callback)?)
        } else {
            None
        };

        Ok(Dispatch { batch, cleanup })
    }
}

impl std::fmt::Debug for SplitMergeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitMergeExecutor")
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

fn delete_sources(
    store: Arc<dyn DocumentStore>,
    documents: Vec<DocumentId>,
    policy: DeletionPolicy,
) -> BatchCallback {
    Box::new(move |report: &BatchReport| {
        if policy == DeletionPolicy::OnAllSucceeded && !report.all_succeeded() {
            warn!(
                failures = report.failures(),
                documents = ?documents,
                "keeping source documents, ingestion batch had failures"
            );
            return;
        }

        match store.delete_documents(&documents) {
            Ok(deleted) => info!(deleted, documents = ?documents, "deleted source documents"),
            Err(e) => error!(error = %e, documents = ?documents, "failed to delete source documents"),
        }
    })
}

/// Remove files built before a plan was aborted.
fn discard(targets: &[BuiltTarget]) {
    for target in targets {
        if let Err(e) = std::fs::remove_file(&target.output_path) {
            debug!(file = %target.output_path.display(), error = %e, "could not remove built file");
        }
    }
}

fn summarize(targets: &[BuiltTarget], cache: CacheStatistics, build_time: Duration) -> ExecutionStatistics {
    ExecutionStatistics {
        targets_built: targets.len(),
        pages_written: targets.iter().map(|t| t.page_count).sum(),
        sources_opened: cache.opened,
        cache_hits: cache.hits,
        handles_closed: cache.closed,
        load_time: cache.load_time,
        write_time: targets.iter().map(|t| t.write_time).sum(),
        build_time,
    }
}
