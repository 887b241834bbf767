use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory along with:
/// - An initial `config.json` file with default settings
/// - An empty `intake.sqlite` database at the current schema version
///
/// # Arguments
/// - `home` - The directory that will hold the data, e.g. `$HOME/intake`
///
/// # Errors
/// - Returns an error if the directory already holds a database or if any file operation fails.
pub async fn init(home: &Path) -> Result<Out<()>> {
    let config = Config::create(home)
        .await
        .context("Unable to create the intake home directory and config")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the intake home directory at {}",
        config.root().display()
    )
    .into())
}
