use crate::commands::{plural, Out};
use crate::import::ImportSummary;
use crate::{Config, Result};
use std::path::Path;

/// Imports the CSV file at `file`, replacing every transaction currently in the store.
///
/// The layout of the file is detected from its header, its name and the start of its content.
/// Rows that cannot be normalized are reported in the returned summary and do not stop the
/// import.
///
/// # Errors
/// - Returns an error of type `File` if the file cannot be read or decoded.
/// - Returns an error of type `Database` if the store cannot be cleared or written.
pub async fn import(config: Config, file: &Path) -> Result<Out<ImportSummary>> {
    let summary = config.importer().import_file(file).await?;
    let count = summary.rows_processed();
    let mut message = format!("Successfully processed {count} row{}", plural(count));
    for e in summary.row_errors() {
        message.push_str(&format!("\n  {e}"));
    }
    Ok(Out::new(message, summary))
}
