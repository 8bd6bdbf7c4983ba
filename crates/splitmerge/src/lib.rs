//! splitmerge - Recombine pages of stored PDF documents into new documents.
//!
//! A [`Plan`] lists the documents to build; each is a sequence of source
//! documents with optional page selections such as `"1,3,5-9,12-10"`. The
//! [`SplitMergeExecutor`] validates the plan, builds every target into a
//! scratch directory and then, unless previewing, hands the files to an
//! [`IngestionDispatcher`](dispatch::IngestionDispatcher), optionally deleting
//! the sources once ingestion of the whole batch has finished.
//!
//! # Examples
//!
//! ```
//! use splitmerge::merge::parse_page_list;
//!
//! let selection = parse_page_list(Some("2,5-3,9")).unwrap();
//! assert_eq!(selection.resolve(9).unwrap(), vec![2, 5, 4, 3, 9]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod merge;
pub mod plan;
pub mod store;

// Re-export commonly used types
pub use config::{DeletionPolicy, DispatcherConfig, ExecutionOptions, MetadataPolicy};
pub use error::{PlanValidationError, Result, SplitMergeError};
pub use merge::{ExecutionOutcome, SplitMergeExecutor};
pub use plan::{Plan, SourceSpec, TargetSpec};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
