//! Building split/merge targets.
//!
//! - [`pages`]: the page selection grammar
//! - [`target`]: assembling one output document page by page
//! - [`metadata`]: PDF properties and business fields carried into a target
//! - [`executor`]: running a whole plan and handing the results to ingestion
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use splitmerge::config::{DispatcherConfig, ExecutionOptions};
//! use splitmerge::dispatch::{DirectoryConsumer, TokioDispatcher};
//! use splitmerge::merge::SplitMergeExecutor;
//! use splitmerge::plan::Plan;
//! use splitmerge::store::InMemoryStore;
//!
//! # fn example(runtime: tokio::runtime::Handle) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::load("documents.json".as_ref())?);
//! let consumer = Arc::new(DirectoryConsumer::new("/srv/consume"));
//! let dispatcher = Arc::new(TokioDispatcher::new(consumer, runtime, &DispatcherConfig::default()));
//!
//! let plan = Plan::from_json(r#"[[{"document": 1, "pages": "1-2"}, {"document": 2, "pages": "3-1"}]]"#)?;
//! let outcome = SplitMergeExecutor::new(store, dispatcher)
//!     .execute(&plan, &ExecutionOptions::new("/tmp/scratch"))?;
//!
//! for file in outcome.files() {
//!     println!("{}", file.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod executor;
pub mod metadata;
pub mod pages;
pub mod target;

pub use executor::{BuiltTarget, Dispatch, ExecutionOutcome, ExecutionStatistics, SplitMergeExecutor};
pub use metadata::{MetadataMerger, Overrides};
pub use pages::{PageSegment, PageSelection, format_page_list, parse_page_list};
pub use target::TargetDocument;
