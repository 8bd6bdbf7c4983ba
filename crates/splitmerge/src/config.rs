//! Execution options for split/merge plans.
//!
//! Options arrive either from the command line or deserialized alongside a
//! plan. This module holds the policy enums, their parsing, defaults and
//! validation of option combinations.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

use crate::SplitMergeError;

/// How business metadata of a built target is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataPolicy {
    /// Leave correspondent, document type and tags for downstream
    /// classification to derive again.
    #[default]
    Redo,
    /// Copy correspondent, document type and tags from the first source of
    /// each target.
    CopyFirst,
}

impl FromStr for MetadataPolicy {
    type Err = SplitMergeError;

    /// Parse a metadata policy: "redo" or "copy_first".
    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "redo" => Ok(Self::Redo),
            "copy_first" | "copy-first" => Ok(Self::CopyFirst),
            _ => Err(SplitMergeError::invalid_config(format!(
                "Invalid metadata policy: {s}. Must be one of: redo, copy_first"
            ))),
        }
    }
}

/// When source documents are deleted after a committed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Delete once every ingestion in the batch has finished, whether or not
    /// each one succeeded.
    #[default]
    OnBatchCompletion,
    /// Delete only if every ingestion in the batch succeeded.
    OnAllSucceeded,
}

impl FromStr for DeletionPolicy {
    type Err = SplitMergeError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "on_batch_completion" => Ok(Self::OnBatchCompletion),
            "on_all_succeeded" => Ok(Self::OnAllSucceeded),
            _ => Err(SplitMergeError::invalid_config(format!(
                "Invalid deletion policy: {s}. Must be one of: on_batch_completion, on_all_succeeded"
            ))),
        }
    }
}

/// Options controlling one plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Business metadata policy.
    #[serde(default)]
    pub metadata: MetadataPolicy,

    /// Delete the source documents after the built targets were ingested.
    #[serde(default, alias = "delete_sources")]
    pub delete_originals: bool,

    /// Build targets without handing them to ingestion.
    #[serde(default = "default_preview")]
    pub preview: bool,

    /// Directory built targets are written to.
    pub scratch_dir: PathBuf,

    /// Gate for source deletion.
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

fn default_preview() -> bool {
    true
}

impl ExecutionOptions {
    /// Options with defaults: redo metadata, keep sources, preview only.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata: MetadataPolicy::default(),
            delete_originals: false,
            preview: default_preview(),
            scratch_dir: scratch_dir.into(),
            deletion_policy: DeletionPolicy::default(),
        }
    }

    /// Whether a committed run should chain source deletion.
    pub fn deletes_sources(&self) -> bool {
        self.delete_originals && !self.preview
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch directory does not exist or is not a
    /// directory.
    pub fn validate(&self) -> Result<()> {
        if !self.scratch_dir.exists() {
            bail!(
                "Scratch directory does not exist: {}",
                self.scratch_dir.display()
            );
        }

        if !self.scratch_dir.is_dir() {
            bail!(
                "Scratch directory is not a directory: {}",
                self.scratch_dir.display()
            );
        }

        if self.delete_originals && self.preview {
            tracing::debug!("delete_originals has no effect in preview mode");
        }

        Ok(())
    }
}

/// Settings for the tokio-backed ingestion dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum number of concurrent ingestions (defaults to CPU count).
    #[serde(default)]
    pub workers: Option<usize>,
}

impl DispatcherConfig {
    /// Get the effective number of workers.
    pub fn effective_workers(&self) -> usize {
        self.workers
            .filter(|workers| *workers > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}
