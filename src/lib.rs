//! Imports loosely-structured bank and budget CSV exports into a local SQLite store.
//!
//! The import pipeline detects which `Layout` a file uses, normalizes each row into a
//! `Transaction` with a single sign convention (money out is negative), and replaces the contents
//! of the store with the result. The stored transactions can be annotated through the CLI
//! commands or the HTTP API.

pub mod args;
pub mod commands;
mod config;
mod db;
mod error;
mod import;
pub mod model;
mod server;
mod utils;


pub use config::Config;
pub use db::Store;
pub use error::{Error, ErrorType, Result};
pub use import::{ImportOptions, ImportSummary, Importer, Layout, DEFAULT_CURRENCY};
