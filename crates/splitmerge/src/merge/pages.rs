//! Page selection grammar.
//!
//! A selection is a comma separated list of parts, each either a page number
//! `N` or a range `A-B`. Ranges run in the direction they are written, so
//! `5-3` selects pages 5, 4 and 3. Order and duplicates are kept: the result
//! is the page order of the output.
//!
//! Parsing keeps ranges as written. Pages are only listed once a selection
//! has been checked against the page count of its document.
//!
//! ```
//! use splitmerge::merge::pages::parse_page_list;
//!
//! let selection = parse_page_list(Some("2,5-3,9")).unwrap();
//! assert_eq!(selection.resolve(10).unwrap(), vec![2, 5, 4, 3, 9]);
//! assert_eq!(selection.resolve(6), Err(9));
//! ```

use crate::error::PlanValidationError;

/// One part of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegment {
    /// A single page.
    Single(u32),
    /// Pages `first` to `last` inclusive, descending when `first > last`.
    Range {
        /// First page in output order.
        first: u32,
        /// Last page in output order.
        last: u32,
    },
}

impl PageSegment {
    /// First page of this segment, in output order, outside `1..=page_count`.
    fn first_out_of_range(&self, page_count: u32) -> Option<u32> {
        let valid = |page: u32| (1..=page_count).contains(&page);
        match *self {
            Self::Single(page) => (!valid(page)).then_some(page),
            Self::Range { first, last } if first <= last => {
                if !valid(first) {
                    Some(first)
                } else if !valid(last) {
                    Some(page_count.saturating_add(1))
                } else {
                    None
                }
            }
            Self::Range { first, last } => {
                if !valid(first) {
                    Some(first)
                } else if !valid(last) {
                    Some(0)
                } else {
                    None
                }
            }
        }
    }

    fn extend_into(&self, pages: &mut Vec<u32>) {
        match *self {
            Self::Single(page) => pages.push(page),
            Self::Range { first, last } if first <= last => pages.extend(first..=last),
            Self::Range { first, last } => pages.extend((last..=first).rev()),
        }
    }
}

/// A parsed page selection.
///
/// An empty selection stands for every page of the document, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection {
    segments: Vec<PageSegment>,
}

impl PageSelection {
    /// Parts of the selection, in output order.
    pub fn segments(&self) -> &[PageSegment] {
        &self.segments
    }

    /// Whether the selection stands for every page.
    pub fn is_all(&self) -> bool {
        self.segments.is_empty()
    }

    /// List the selected pages of a document with `page_count` pages.
    ///
    /// Every segment is checked before anything is listed, so the result is
    /// never longer than the selection's parts times `page_count`.
    ///
    /// # Errors
    ///
    /// Returns the first selected page, in output order, that the document
    /// does not have.
    pub fn resolve(&self, page_count: usize) -> Result<Vec<u32>, u32> {
        let page_count = u32::try_from(page_count).unwrap_or(u32::MAX);

        if self.is_all() {
            return Ok((1..=page_count).collect());
        }

        if let Some(page) = self
            .segments
            .iter()
            .find_map(|segment| segment.first_out_of_range(page_count))
        {
            return Err(page);
        }

        let mut pages = Vec::new();
        for segment in &self.segments {
            segment.extend_into(&mut pages);
        }
        Ok(pages)
    }
}

/// Parse a page selection.
///
/// An absent or empty selection yields [`PageSelection::is_all`]. Page
/// numbers are not checked against any document here; see
/// [`PageSelection::resolve`].
///
/// # Errors
///
/// Returns [`PlanValidationError::InvalidPageRange`] carrying the whole
/// expression if any part is neither `N` nor `A-B`.
pub fn parse_page_list(expression: Option<&str>) -> Result<PageSelection, PlanValidationError> {
    let Some(expression) = expression.filter(|e| !e.is_empty()) else {
        return Ok(PageSelection::default());
    };

    let invalid = || PlanValidationError::InvalidPageRange {
        expression: expression.to_string(),
    };

    let mut segments = Vec::new();
    for part in expression.split(',') {
        let segment = match part.split_once('-') {
            None => PageSegment::Single(parse_number(part).ok_or_else(invalid)?),
            Some((first, last)) => PageSegment::Range {
                first: parse_number(first).ok_or_else(invalid)?,
                last: parse_number(last).ok_or_else(invalid)?,
            },
        };
        segments.push(segment);
    }

    Ok(PageSelection { segments })
}

/// Digits only: no sign, no whitespace.
fn parse_number(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Format page numbers as a selection that parses back to the same list.
///
/// Runs of consecutive pages, ascending or descending, collapse into ranges.
///
/// ```
/// use splitmerge::merge::pages::format_page_list;
///
/// assert_eq!(format_page_list(&[1, 2, 3, 7, 6, 5, 9]), "1-3,7-5,9");
/// ```
pub fn format_page_list(pages: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut start = 0;

    while start < pages.len() {
        let mut end = start;
        if let Some(next) = pages.get(start + 1) {
            let step = i64::from(*next) - i64::from(pages[start]);
            if step.abs() == 1 {
                while end + 1 < pages.len()
                    && i64::from(pages[end + 1]) - i64::from(pages[end]) == step
                {
                    end += 1;
                }
            }
        }

        if end > start {
            parts.push(format!("{}-{}", pages[start], pages[end]));
        } else {
            parts.push(pages[start].to_string());
        }
        start = end + 1;
    }

    parts.join(",")
}
