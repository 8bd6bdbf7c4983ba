//! CLI argument parsing for splitmerge.
//!
//! Arguments map onto [`ExecutionOptions`] and [`DispatcherConfig`]; anything
//! the library validates on its own (plan syntax, the scratch directory) is
//! left to the library.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use splitmerge::config::{DeletionPolicy, DispatcherConfig, ExecutionOptions, MetadataPolicy};
use splitmerge::error::{Result, SplitMergeError};

/// Split and merge pages of stored PDF documents.
///
/// Reads a plan (a JSON list of targets, each a list of
/// `{"document": ID, "pages": "RANGE"}` sources), builds one PDF per target
/// into the scratch directory and prints the built files. Nothing is handed
/// to ingestion unless --commit is given.
#[derive(Parser, Debug)]
#[command(name = "splitmerge")]
#[command(version)]
#[command(about = "Split and merge pages of stored PDF documents", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Plan file (JSON)
    ///
    /// Example:
    ///   [[{"document": 1, "pages": "1-2"}, {"document": 2, "pages": "3-1"}]]
    #[arg(short, long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Document manifest (JSON list of document records)
    #[arg(short, long, value_name = "FILE", env = "SPLITMERGE_DOCUMENTS")]
    pub documents: PathBuf,

    /// Directory built files are written to
    #[arg(short, long, value_name = "DIR", env = "SPLITMERGE_SCRATCH_DIR")]
    pub scratch_dir: PathBuf,

    /// How correspondent, document type and tags are derived
    ///
    /// - redo: leave them for ingestion to classify again (default)
    /// - copy_first: copy them from the first source of each target
    #[arg(short, long, value_name = "POLICY", default_value = "redo")]
    #[arg(value_parser = ["redo", "copy_first"])]
    pub metadata: String,

    /// Hand built files to ingestion instead of only previewing them
    #[arg(long)]
    pub commit: bool,

    /// Consumption directory receiving committed files
    #[arg(long, value_name = "DIR", env = "SPLITMERGE_CONSUME_DIR")]
    pub consume_dir: Option<PathBuf>,

    /// Delete every source document once ingestion of the batch has finished
    #[arg(long)]
    pub delete_originals: bool,

    /// Only delete sources if every ingestion succeeded
    #[arg(long, requires = "delete_originals")]
    pub require_all_success: bool,

    /// Number of concurrent ingestions
    ///
    /// Default is number of CPU cores.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Validate argument combinations clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if `--commit` lacks a consumption directory or the
    /// job count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.commit && self.consume_dir.is_none() {
            return Err(SplitMergeError::invalid_config(
                "--commit requires --consume-dir",
            ));
        }

        if let Some(jobs) = self.jobs
            && jobs == 0
        {
            return Err(SplitMergeError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }

        if let Some(ref dir) = self.consume_dir
            && !dir.is_dir()
        {
            return Err(SplitMergeError::invalid_config(format!(
                "Consumption directory does not exist: {}",
                dir.display()
            )));
        }

        Ok(())
    }

    /// Execution options described by the arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata policy is unknown.
    pub fn to_options(&self) -> Result<ExecutionOptions> {
        let metadata: MetadataPolicy = self.metadata.parse()?;
        let deletion_policy = if self.require_all_success {
            DeletionPolicy::OnAllSucceeded
        } else {
            DeletionPolicy::OnBatchCompletion
        };

        Ok(ExecutionOptions {
            metadata,
            delete_originals: self.delete_originals,
            preview: !self.commit,
            scratch_dir: self.scratch_dir.clone(),
            deletion_policy,
        })
    }

    /// Dispatcher settings described by the arguments.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig { workers: self.jobs }
    }

    /// Default log directive for the chosen verbosity.
    pub fn log_directive(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "splitmerge=info,warn",
            (false, 1) => "splitmerge=debug,info",
            (false, _) => "trace",
        }
    }
}
