//! Tokio-backed ingestion dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{self, StreamExt};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::{
    BatchCallback, BatchHandle, BatchReport, Consumer, ConsumeRequest, FollowUp,
    IngestionDispatcher, PendingTask, TaskId, TaskOutcome,
};
use crate::config::DispatcherConfig;
use crate::error::Result;

/// Runs ingestions on a tokio runtime with bounded concurrency.
///
/// Every submitted batch is driven by its own task; within a batch at most
/// `workers` ingestions run at once. Methods may be called from outside the
/// runtime, e.g. from a blocking thread.
pub struct TokioDispatcher {
    consumer: Arc<dyn Consumer>,
    runtime: Handle,
    workers: usize,
    next_task: AtomicU64,
    next_batch: AtomicU64,
}

impl TokioDispatcher {
    /// Create a dispatcher spawning onto `runtime`.
    pub fn new(consumer: Arc<dyn Consumer>, runtime: Handle, config: &DispatcherConfig) -> Self {
        Self {
            consumer,
            runtime,
            workers: config.effective_workers().max(1),
            next_task: AtomicU64::new(1),
            next_batch: AtomicU64::new(1),
        }
    }

    /// Create a dispatcher on the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn current(consumer: Arc<dyn Consumer>, config: &DispatcherConfig) -> Self {
        Self::new(consumer, Handle::current(), config)
    }

    /// Maximum concurrent ingestions per batch.
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl std::fmt::Debug for TokioDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioDispatcher")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl IngestionDispatcher for TokioDispatcher {
    fn submit(&self, request: ConsumeRequest) -> PendingTask {
        let id = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
        debug!(task = %id, file = %request.file_path.display(), "registered ingestion");
        PendingTask { id, request }
    }

    fn submit_batch(&self, tasks: Vec<PendingTask>) -> Result<BatchHandle> {
        let batch_id = self.next_batch.fetch_add(1, Ordering::Relaxed);
        let (handle, completion) = BatchHandle::new(batch_id, tasks.iter().map(|t| t.id).collect());
        let consumer = Arc::clone(&self.consumer);
        let workers = self.workers;

        info!(batch = batch_id, tasks = tasks.len(), workers, "dispatching ingestion batch");

        self.runtime.spawn(async move {
            let runs = tasks.into_iter().map(|task| {
                let consumer = Arc::clone(&consumer);
                async move {
                    let id = task.id;
                    // A panicking consumer fails its own task, not the batch.
                    let joined =
                        tokio::spawn(async move { consumer.consume(&task.request).await }).await;
                    let outcome = match joined {
                        Ok(Ok(receipt)) => {
                            debug!(task = %id, stored_at = %receipt.stored_at.display(), "ingestion finished");
                            TaskOutcome::Succeeded(receipt)
                        }
                        Ok(Err(e)) => {
                            warn!(task = %id, error = %e, "ingestion failed");
                            TaskOutcome::Failed(e.to_string())
                        }
                        Err(e) => {
                            warn!(task = %id, error = %e, "ingestion task died");
                            TaskOutcome::Failed(e.to_string())
                        }
                    };
                    (id, outcome)
                }
            });

            let mut outcomes: Vec<(TaskId, TaskOutcome)> = stream::iter(runs)
                .buffer_unordered(workers)
                .collect::<Vec<_>>()
                .await;

            // Sort by task id to report in submission order
            outcomes.sort_by_key(|(id, _)| *id);

            let report = BatchReport { outcomes };
            info!(
                batch = batch_id,
                tasks = report.len(),
                failures = report.failures(),
                "ingestion batch completed"
            );
            completion.complete(report);
        });

        Ok(handle)
    }

    fn on_batch_complete(&self, batch: &BatchHandle, callback: BatchCallback) -> Result<FollowUp> {
        let batch = batch.clone();
        let task = self.runtime.spawn(async move {
            match batch.wait().await {
                Ok(report) => callback(&report),
                Err(e) => warn!(batch = batch.id(), error = %e, "batch follow-up skipped"),
            }
        });
        Ok(FollowUp::spawned(task))
    }
}
