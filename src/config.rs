//! Configuration file handling.
//!
//! The configuration file is stored at `$INTAKE_HOME/config.json` next to the SQLite database
//! `$INTAKE_HOME/intake.sqlite`. It holds the default currency applied to imported rows, the
//! address the HTTP API listens on, and optional paths to the bundled example file and a built
//! frontend.

use crate::db::Db;
use crate::error::{ErrorType, IntoResult, Re};
use crate::import::{ImportOptions, Importer, DEFAULT_CURRENCY};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const APP_NAME: &str = "intake";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const INTAKE_SQLITE: &str = "intake.sqlite";
const EXAMPLE_CSV: &str = "sample_transactions.csv";
const DEFAULT_LISTEN: &str = "0.0.0.0:5001";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$INTAKE_HOME` and from there it loads `$INTAKE_HOME/config.json` and opens the
/// database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the home directory, an initial `config.json` with default settings, and an empty
    /// database.
    ///
    /// # Errors
    /// - Returns an error if the directory already holds a database or if any file operation
    ///   fails.
    pub(crate) async fn create(dir: impl Into<PathBuf>) -> Re<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the intake home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let sqlite_path = root.join(INTAKE_SQLITE);
        let db = Db::init(&sqlite_path)
            .await
            .context("Unable to create SQLite DB")?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load the config file
    /// - open the database, migrating it if it was written by an older release
    ///
    /// # Errors
    /// - Returns an error of type `Config` if any of these steps fail.
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Re<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The intake home directory is missing, run 'intake init' first")?;
        let _ = utils::read_dir(&root)
            .await
            .context("The intake home directory is not readable")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let sqlite_path = root.join(INTAKE_SQLITE);
        let db = Db::load(&sqlite_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub fn default_currency(&self) -> &str {
        &self.config_file.default_currency
    }

    pub fn listen(&self) -> &str {
        &self.config_file.listen
    }

    /// The bundled example file. Defaults to `$INTAKE_HOME/sample_transactions.csv`.
    pub fn example_file(&self) -> PathBuf {
        self.resolve(
            self.config_file
                .example_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(EXAMPLE_CSV)),
        )
    }

    /// The directory of a built frontend to serve, if one is configured.
    pub fn static_dir(&self) -> Option<PathBuf> {
        self.config_file.static_dir.clone().map(|p| self.resolve(p))
    }

    /// Creates an `Importer` that writes to this configuration's database.
    pub fn importer(&self) -> Importer {
        Importer::new(
            Arc::new(self.db.clone()),
            ImportOptions::new(self.default_currency()),
        )
    }

    /// Checks if `p` is relative, and if so, resolves it against the home directory.
    fn resolve(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    #[cfg(test)]
    pub(crate) async fn set_config_file(&mut self, config_file: ConfigFile) {
        config_file.save(&self.config_path).await.unwrap();
        self.config_file = config_file;
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "intake",
///   "config_version": 1,
///   "default_currency": "USD",
///   "listen": "0.0.0.0:5001",
///   "example_file": "sample_transactions.csv",
///   "static_dir": "frontend/build"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct ConfigFile {
    /// Application name, should always be "intake"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Currency given to imported transactions
    #[serde(default = "default_currency")]
    default_currency: String,

    /// Socket address the HTTP API binds to
    #[serde(default = "default_listen")]
    listen: String,

    /// Path to the example CSV (relative to the home directory or absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    example_file: Option<PathBuf>,

    /// Path to a built frontend (relative to the home directory or absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    static_dir: Option<PathBuf>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            default_currency: default_currency(),
            listen: default_listen(),
            example_file: None,
            static_dir: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app.
    pub(crate) async fn load(path: impl AsRef<Path>) -> Re<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            !config.default_currency.trim().is_empty(),
            "The default_currency in {} cannot be empty",
            path.display()
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub(crate) async fn save(&self, path: impl AsRef<Path>) -> Re<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    #[cfg(test)]
    pub(crate) fn new(
        default_currency: &str,
        example_file: Option<PathBuf>,
        static_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            default_currency: default_currency.to_string(),
            example_file,
            static_dir,
            ..Default::default()
        }
    }
}
