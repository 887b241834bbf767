//! These structs provide the CLI interface for the intake CLI.

use crate::model::TransactionField;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// intake: Imports bank and budget CSV exports into a local store.
///
/// The layout of each file is detected from its header, its name and the start of its content.
/// Budget exports with Outflow/Inflow columns, bank exports with debit/credit columns, and
/// headerless files read by position are all understood. Every import replaces the transactions
/// that were there before.
///
/// The imported transactions can be listed and annotated from the command line or through the
/// HTTP API started by the serve subcommand.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and an empty database.
    ///
    /// This is the first command you should run. By default the data directory is $HOME/intake,
    /// pass --home or set INTAKE_HOME to put it somewhere else.
    Init,
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Import a CSV file, replacing all existing transactions.
    Import(ImportArgs),
    /// Print all transactions, newest first.
    List,
    /// Delete all transactions.
    Clear,
    /// Change one field of one transaction.
    Update(UpdateArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where intake data and configuration is held. Defaults to ~/intake
    #[arg(long, env = "INTAKE_HOME", default_value_t = default_intake_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `intake serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The address to listen on, e.g. 127.0.0.1:5001. Defaults to the `listen` value in
    /// config.json.
    #[arg(long)]
    listen: Option<String>,
}

impl ServeArgs {
    pub fn new(listen: Option<String>) -> Self {
        Self { listen }
    }

    pub fn listen(&self) -> Option<&str> {
        self.listen.as_deref()
    }
}

/// (Not shown): Args for the `intake import` command.
#[derive(Debug, Parser, Clone)]
pub struct ImportArgs {
    /// The CSV file to import.
    #[arg(long)]
    file: PathBuf,
}

impl ImportArgs {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// (Not shown): Args for the `intake update` command.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    /// The id of the transaction, as shown by `intake list`.
    #[arg(long)]
    id: String,

    /// The field to change: category, currency, account or memo. Setting category stores the
    /// value as the custom category and leaves the imported category alone.
    #[arg(long)]
    field: TransactionField,

    /// The new value.
    #[arg(long)]
    value: String,
}

impl UpdateArgs {
    pub fn new(id: impl Into<String>, field: TransactionField, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field,
            value: value.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn field(&self) -> TransactionField {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

fn default_intake_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("intake"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or INTAKE_HOME instead of relying on the default \
                intake home directory.",
            );
            PathBuf::from("intake")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
