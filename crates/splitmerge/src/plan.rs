//! Split/merge plans.
//!
//! A plan is an ordered list of targets; each target is an ordered list of
//! sources contributing pages. In JSON:
//!
//! ```json
//! [
//!   [{"document": 1, "pages": "1-2"}, {"document": 2}],
//!   [{"document": 1, "pages": "3-1"}]
//! ]
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{PlanValidationError, Result, SplitMergeError};
use crate::merge::pages::{PageSelection, parse_page_list};
use crate::store::DocumentId;

/// One source document, optionally restricted to a page selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source document id.
    pub document: DocumentId,

    /// Page selection; all pages when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
}

impl SourceSpec {
    /// All pages of a document.
    pub fn whole(document: DocumentId) -> Self {
        Self {
            document,
            pages: None,
        }
    }

    /// A page selection of a document.
    pub fn pages(document: DocumentId, pages: impl Into<String>) -> Self {
        Self {
            document,
            pages: Some(pages.into()),
        }
    }

    /// Parse the page selection. An empty selection means "all pages".
    ///
    /// # Errors
    ///
    /// Returns an error if the selection is malformed.
    pub fn requested_pages(&self) -> std::result::Result<PageSelection, PlanValidationError> {
        parse_page_list(self.pages.as_deref())
    }
}

/// One output document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSpec {
    /// Sources in output order.
    pub sources: Vec<SourceSpec>,
}

impl TargetSpec {
    /// Create a target from its sources.
    pub fn new(sources: impl IntoIterator<Item = SourceSpec>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }
}

/// A complete split/merge job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    /// Targets in execution order.
    pub targets: Vec<TargetSpec>,
}

impl Plan {
    /// Create a plan from its targets.
    pub fn new(targets: impl IntoIterator<Item = TargetSpec>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    /// Parse a plan from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a plan.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| SplitMergeError::invalid_config(format!("Invalid plan: {err}")))
    }

    /// Check the shape of the plan.
    ///
    /// Only structure and page selection syntax are checked; documents and
    /// page numbers are resolved during execution.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty plan, an empty target, or a malformed
    /// page selection.
    pub fn validate(&self) -> std::result::Result<(), PlanValidationError> {
        if self.targets.is_empty() {
            return Err(PlanValidationError::EmptyPlan);
        }

        for (index, target) in self.targets.iter().enumerate() {
            if target.sources.is_empty() {
                return Err(PlanValidationError::EmptyTarget { index });
            }
            for source in &target.sources {
                source.requested_pages()?;
            }
        }

        Ok(())
    }

    /// Every distinct document referenced by the plan, ordered by id.
    pub fn source_documents(&self) -> BTreeSet<DocumentId> {
        self.targets
            .iter()
            .flat_map(|target| target.sources.iter().map(|source| source.document))
            .collect()
    }
}
