//! Format detection.
//!
//! A file is classified once, before any row is normalized, by walking a priority-ordered list
//! of predicates. The first predicate that matches decides the layout; when none match the file
//! is read positionally.

use crate::model::{strip_cell, Mapping};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many characters from the start of the file the content heuristic looks at.
const SAMPLE_CHARS: usize = 500;

/// The file name that is always treated as a debit/credit export (when its header allows it).
const DEBIT_CREDIT_FILE: &str = "sample_transactions.csv";

/// A recognized column arrangement.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// A budgeting app export with `Outflow` and `Inflow` columns.
    Budget,
    /// A bank export with named `debit` and `credit` columns.
    DebitCredit,
    /// No usable header: date, description, debit, credit by position.
    Positional,
}

serde_plain::derive_display_from_serialize!(Layout);
serde_plain::derive_fromstr_from_deserialize!(Layout);

/// What the detector gets to look at.
#[derive(Debug, Clone)]
pub(crate) struct Sample<'a> {
    filename: &'a str,
    header: Mapping,
    content: &'a str,
}

impl<'a> Sample<'a> {
    pub(crate) fn new<S: AsRef<str>>(filename: &'a str, first_row: &[S], content: &'a str) -> Self {
        let end = content
            .char_indices()
            .nth(SAMPLE_CHARS)
            .map(|(ix, _)| ix)
            .unwrap_or(content.len());
        Self {
            filename,
            header: Mapping::new(first_row),
            content: &content[..end],
        }
    }
}

type Predicate = fn(&Sample<'_>) -> bool;

/// Detectors in priority order: named headers, then file name or content, then (implicitly)
/// positional.
const DETECTORS: &[(Layout, Predicate)] = &[
    (Layout::Budget, has_budget_headers),
    (Layout::DebitCredit, looks_like_debit_credit),
];

/// Classifies a file. Never fails: anything unrecognized is `Positional`.
pub(crate) fn detect(sample: &Sample<'_>) -> Layout {
    let layout = DETECTORS
        .iter()
        .find(|(_, predicate)| predicate(sample))
        .map(|(layout, _)| *layout)
        .unwrap_or(Layout::Positional);
    debug!("Detected layout '{layout}' for '{}'", sample.filename);
    layout
}

fn has_budget_headers(sample: &Sample<'_>) -> bool {
    sample.header.contains("outflow") && sample.header.contains("inflow")
}

/// Matches on the file name or on both `debit` and `credit` appearing near the top of the file.
/// The header must also name a `debit` or `credit` column, otherwise there is nothing to look up
/// by name and the file is better read positionally.
///
/// Only the `debit`/`credit` columns are checked here. A header such as
/// `Posted Date,Description,Debit,Credit` still matches, and every row then fails for want of a
/// `date` column, even though reading the file by position would have worked.
fn looks_like_debit_credit(sample: &Sample<'_>) -> bool {
    let by_name = sample.filename.to_lowercase().contains(DEBIT_CREDIT_FILE);
    let content = sample.content.to_lowercase();
    let by_content = content.contains("debit") && content.contains("credit");
    let has_columns = sample.header.contains("debit") || sample.header.contains("credit");
    (by_name || by_content) && has_columns
}

/// Returns true if the first row of a positional file is a header rather than data.
pub(crate) fn is_positional_header<S: AsRef<str>>(row: &[S]) -> bool {
    let first = row
        .first()
        .map(|s| strip_cell(s.as_ref()).to_lowercase())
        .unwrap_or_default();
    let second = row
        .get(1)
        .map(|s| strip_cell(s.as_ref()).to_lowercase())
        .unwrap_or_default();
    first.contains("date") || first.contains("time") || second.contains("description")
}
