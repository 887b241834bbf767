//! The import pipeline: bytes in, normalized transactions persisted, summary out.
//!
//! An import replaces the whole store. The store is cleared first, the file is decoded and
//! classified into a `Layout`, every row goes through that layout's normalizer, and all resulting
//! transactions are inserted in one commit. A bad row never stops the rows after it.
//!
//! If the file cannot be decoded after the store has been cleared, the store stays empty. Callers
//! must be prepared to find an empty store after a failed import.

mod layout;
mod normalize;

pub use layout::Layout;

use crate::db::Store;
use crate::error::{ErrorType, IntoResult};
use crate::model::{Mapping, Transaction};
use crate::Result;
use anyhow::Context;
use normalize::{RowOutcome, SkipReason};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The currency used when a source file does not provide one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Settings the pipeline needs, passed in at construction.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    default_currency: String,
}

impl ImportOptions {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            default_currency: default_currency.into(),
        }
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

/// The outcome of one import.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    layout: Layout,
    rows_processed: usize,
    rows_skipped: usize,
    row_errors: Vec<String>,
}

impl ImportSummary {
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The number of transactions inserted.
    pub fn rows_processed(&self) -> usize {
        self.rows_processed
    }

    /// Rows dropped because they had no amount, too few columns, or nothing at all.
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// One message per row that could not be normalized, including the row content.
    pub fn row_errors(&self) -> &[String] {
        &self.row_errors
    }
}

/// Runs imports against a `Store`.
#[derive(Debug)]
pub struct Importer {
    store: Arc<dyn Store>,
    options: ImportOptions,
    // Two imports through the same importer never interleave their clear and insert.
    running: Mutex<()>,
}

impl Importer {
    pub fn new(store: Arc<dyn Store>, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            running: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Reads the file at `path` and imports it, using its file name as the layout hint. A file
    /// that cannot be read is an error of type `File` and leaves the store untouched.
    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
            .pub_result(ErrorType::File)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.import(&bytes, &name).await
    }

    /// Replaces the contents of the store with the transactions found in `bytes`.
    ///
    /// `filename_hint` is the name the file was uploaded with; it only influences layout
    /// detection.
    pub async fn import(&self, bytes: &[u8], filename_hint: &str) -> Result<ImportSummary> {
        let _running = self.running.lock().await;

        let cleared = self
            .store
            .clear_transactions()
            .await
            .pub_result(ErrorType::Database)?;
        debug!("Cleared {cleared} transactions before import of '{filename_hint}'");

        let text = decode(bytes)?;
        let records = read_records(text);
        let layout = detect_layout(&records, text, filename_hint);
        info!("Importing '{filename_hint}' as {layout} layout");

        let normalized = normalize_records(layout, &records, self.options.default_currency());

        let inserted = self
            .store
            .insert_transactions(&normalized.transactions)
            .await
            .pub_result(ErrorType::Database)?;
        info!(
            "Imported {inserted} transactions ({} skipped, {} errors)",
            normalized.skipped,
            normalized.errors.len()
        );

        Ok(ImportSummary {
            layout,
            rows_processed: inserted as usize,
            rows_skipped: normalized.skipped,
            row_errors: normalized.errors,
        })
    }
}

/// A CSV record or the reason it could not be read.
type Record = std::result::Result<Vec<String>, String>;

fn decode(bytes: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(bytes)
        .context("The file is not valid UTF-8 text")
        .pub_result(ErrorType::File)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Reads every record without headers. Rows may have any number of fields.
fn read_records(text: &str) -> Vec<Record> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .records()
        .map(|result| {
            result
                .map(|record| record.iter().map(|field| field.to_string()).collect::<Vec<_>>())
                .map_err(|e| e.to_string())
        })
        .collect()
}

/// Classifies the file from its first record. A first record that could not be read means the
/// file is read positionally.
fn detect_layout(records: &[Record], text: &str, filename_hint: &str) -> Layout {
    match records.first() {
        Some(Ok(first)) => {
            layout::detect(&layout::Sample::new(filename_hint, first.as_slice(), text))
        }
        Some(Err(e)) => {
            warn!("Unable to read the first row of '{filename_hint}', reading positionally: {e}");
            Layout::Positional
        }
        None => Layout::Positional,
    }
}

#[derive(Debug, Default)]
struct Normalized {
    transactions: Vec<Transaction>,
    skipped: usize,
    errors: Vec<String>,
}

fn normalize_records(layout: Layout, records: &[Record], currency: &str) -> Normalized {
    let mut out = Normalized::default();

    // Named layouts take their header from the first record. Positional files may or may not
    // start with a header, which is decided once here.
    let (mapping, first_data) = match (layout, records.first()) {
        (Layout::Budget | Layout::DebitCredit, Some(Ok(header))) => (Mapping::new(header), 1),
        (Layout::Positional, Some(Ok(first))) if layout::is_positional_header(first.as_slice()) => {
            debug!("Skipping header row {first:?}");
            (Mapping::default(), 1)
        }
        _ => (Mapping::default(), 0),
    };

    for (ix, record) in records.iter().enumerate().skip(first_data) {
        let line = ix + 1;
        let row = match record {
            Ok(row) => row.as_slice(),
            Err(e) => {
                warn!("Unable to read row {line}: {e}");
                out.errors.push(format!("Error reading row {line}: {e}"));
                continue;
            }
        };

        let outcome = if normalize::is_blank(row) {
            RowOutcome::Skip(SkipReason::Blank)
        } else {
            match layout {
                Layout::Budget => normalize::budget(&mapping, row, currency),
                Layout::DebitCredit => normalize::debit_credit(&mapping, row, currency),
                Layout::Positional => normalize::positional(row, currency),
            }
        };

        match outcome {
            RowOutcome::Row(transaction) => {
                debug!(
                    "Row {line}: {}, {}, {}",
                    transaction.date(),
                    transaction.description(),
                    transaction.amount()
                );
                out.transactions.push(transaction);
            }
            RowOutcome::Skip(reason) => {
                debug!("Skipping row {line} ({reason}): {row:?}");
                out.skipped += 1;
            }
            RowOutcome::Error(reason) => {
                warn!("Error processing row {line} {row:?}: {reason}");
                out.errors
                    .push(format!("Error processing row {line} {row:?}: {reason}"));
            }
        }
    }
    out
}
