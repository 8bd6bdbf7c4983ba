//! Handing built targets to ingestion.
//!
//! Dispatch is split into two explicit steps: [`IngestionDispatcher::submit_batch`]
//! starts a group of ingestions and returns a [`BatchHandle`], and
//! [`IngestionDispatcher::on_batch_complete`] registers a follow-up that runs
//! once every task of that batch reached a terminal state. Neither step
//! waits for ingestion to finish.
//!
//! What "ingestion" means is up to a [`Consumer`]; [`DirectoryConsumer`]
//! drops the file and a JSON sidecar of its overrides into a consumption
//! directory.

pub mod consume_dir;
pub mod runner;

pub use consume_dir::DirectoryConsumer;
pub use runner::TokioDispatcher;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, SplitMergeError};
use crate::merge::metadata::Overrides;
use crate::store::DocumentId;

/// A built file waiting to be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeRequest {
    /// The built file. Ingestion takes ownership of it.
    pub file_path: PathBuf,

    /// Values to apply to the ingested document.
    pub overrides: Overrides,
}

/// Identity of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A request registered with a dispatcher but not started yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    /// Task identity.
    pub id: TaskId,
    /// What to ingest.
    pub request: ConsumeRequest,
}

/// Result of one successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeReceipt {
    /// Where the file ended up.
    pub stored_at: PathBuf,

    /// Id of the created document, if the consumer assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
}

/// Terminal state of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Ingestion finished.
    Succeeded(ConsumeReceipt),
    /// Ingestion failed or the task died.
    Failed(String),
}

impl TaskOutcome {
    /// Whether ingestion finished.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Terminal states of every task in a batch, in task order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Outcome per task.
    pub outcomes: Vec<(TaskId, TaskOutcome)>,
}

impl BatchReport {
    /// Whether every task succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }

    /// Number of failed tasks.
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .count()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch had no tasks.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

type ReportSlot = Option<Arc<BatchReport>>;

/// Reference to a dispatched batch.
///
/// Handles are cheap to clone; every clone observes the same completion.
#[derive(Debug, Clone)]
pub struct BatchHandle {
    id: u64,
    tasks: Vec<TaskId>,
    report: watch::Receiver<ReportSlot>,
}

/// Completes the [`BatchHandle`] it was created with.
#[derive(Debug)]
pub struct BatchCompletion {
    sender: watch::Sender<ReportSlot>,
}

impl BatchCompletion {
    /// Publish the final report to every handle.
    pub fn complete(self, report: BatchReport) {
        self.sender.send_replace(Some(Arc::new(report)));
    }
}

impl BatchHandle {
    /// Create a handle for a batch that has not completed yet.
    pub fn new(id: u64, tasks: Vec<TaskId>) -> (Self, BatchCompletion) {
        let (sender, report) = watch::channel(None);
        (Self { id, tasks, report }, BatchCompletion { sender })
    }

    /// Batch identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tasks of the batch, in submission order.
    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    /// The final report, if the batch already completed.
    pub fn report(&self) -> Option<Arc<BatchReport>> {
        self.report.borrow().clone()
    }

    /// Wait until every task of the batch reached a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was abandoned without a report.
    pub async fn wait(&self) -> Result<Arc<BatchReport>> {
        let mut report = self.report.clone();
        let slot = report.wait_for(Option::is_some).await.map_err(|_| {
            SplitMergeError::dispatch_failed(format!(
                "batch {} was abandoned before completion",
                self.id
            ))
        })?;
        let report: ReportSlot = (*slot).clone();
        report.ok_or_else(|| {
            SplitMergeError::dispatch_failed(format!("batch {} has no report", self.id))
        })
    }
}

/// Follow-up run once a batch completes.
pub type BatchCallback = Box<dyn FnOnce(&BatchReport) + Send + 'static>;

/// Handle on a registered batch follow-up.
#[derive(Debug)]
pub struct FollowUp {
    task: Option<JoinHandle<()>>,
}

impl FollowUp {
    /// A follow-up running as a task.
    pub fn spawned(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A follow-up that already ran.
    pub fn finished() -> Self {
        Self { task: None }
    }

    /// Whether the follow-up has run.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the follow-up to run.
    ///
    /// # Errors
    ///
    /// Returns an error if the follow-up panicked or was cancelled.
    pub async fn wait(self) -> Result<()> {
        if let Some(task) = self.task {
            task.await.map_err(|e| {
                SplitMergeError::dispatch_failed(format!("batch follow-up did not finish: {e}"))
            })?;
        }
        Ok(())
    }
}

/// Asynchronous ingestion of built files.
///
/// Implementations must not block: every method returns immediately and the
/// work happens elsewhere.
pub trait IngestionDispatcher: Send + Sync {
    /// Register one request. Nothing runs until its batch is submitted.
    fn submit(&self, request: ConsumeRequest) -> PendingTask;

    /// Start ingesting `tasks` as one group. Tasks may run concurrently and in
    /// any order.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be scheduled.
    fn submit_batch(&self, tasks: Vec<PendingTask>) -> Result<BatchHandle>;

    /// Run `callback` once every task of `batch` reached a terminal state,
    /// whether it succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback could not be scheduled.
    fn on_batch_complete(&self, batch: &BatchHandle, callback: BatchCallback) -> Result<FollowUp>;
}

/// Ingests one built file.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Ingest the file of `request`, applying its overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be ingested.
    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeReceipt>;
}
