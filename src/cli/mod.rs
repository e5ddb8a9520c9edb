//! CLI support for sieve-query
//!
//! Provides programmatic access to the `sieve` commands so other tools can
//! compile or run queries without shelling out.

mod check;
mod convert;
mod docs;

pub use check::{CompileOptions, FilterOptions, execute_canonical, execute_compile, execute_filter};
pub use convert::{load_config, load_schema, parse_now, parse_records, statement_to_json};
pub use docs::{DocCategory, get_doc_category, get_docs_overview};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{code}: {0}", code = .0.code())]
    Query(#[from] crate::DslError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid reference time '{0}'; expected YYYY-MM-DDTHH:MM:SS")]
    InvalidNow(String),
    #[error("Records must be a JSON array of objects")]
    NotAnArray,
    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,
    #[error("Unknown category: '{0}'\nRun 'sieve docs' to see available categories.")]
    UnknownCategory(String),
}
