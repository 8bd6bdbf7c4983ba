//! I/O operations for splitmerge.
//!
//! This module handles all file I/O:
//! - Loading source PDFs ([`PdfReader`])
//! - Keeping sources open for the length of one execution ([`SourceHandleCache`])
//! - Writing built targets to the scratch directory ([`PdfWriter`])

pub mod cache;
pub mod reader;
pub mod writer;

pub use cache::{CacheStatistics, SourceHandle, SourceHandleCache};
pub use reader::{LoadedPdf, PdfReader, PdfVersion};
pub use writer::{PdfWriter, WriteOptions, WriteStatistics};
