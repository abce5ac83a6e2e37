//! Error types for the data-loader crate.
//!
//! Two families live here:
//! - `DataLoadError` for everything that can go wrong while reading the CSV files
//! - `ResolutionError` for favorite titles that cannot be mapped onto exactly one movie
//!
//! Both derive their `Display` and `Error` impls through thiserror.

use crate::types::MovieId;
use thiserror::Error;

/// Errors that can occur during data loading and parsing
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Row in a data file couldn't be parsed
    ///
    /// `line` is the 1-based line reported by the CSV reader (0 when unknown)
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;

/// Why a single title could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolutionReason {
    /// No movie carries this title
    NotFound,
    /// Several movies carry this title; ids are ascending
    Ambiguous(Vec<MovieId>),
}

/// One title that failed to resolve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", describe(.title, .reason))]
pub struct UnresolvedTitle {
    pub title: String,
    pub reason: UnresolutionReason,
}

fn describe(title: &str, reason: &UnresolutionReason) -> String {
    match reason {
        UnresolutionReason::NotFound => format!("title {title:?} not found"),
        UnresolutionReason::Ambiguous(ids) => {
            format!("title {title:?} is ambiguous ({} movies)", ids.len())
        }
    }
}

/// One or more favorite titles could not be mapped into the catalog.
///
/// Every failing title is listed so the caller can re-prompt for all of
/// them at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} title(s) could not be resolved", .failures.len())]
pub struct ResolutionError {
    pub failures: Vec<UnresolvedTitle>,
}

impl ResolutionError {
    /// Titles that were not found at all
    pub fn not_found(&self) -> impl Iterator<Item = &str> {
        self.failures
            .iter()
            .filter(|f| f.reason == UnresolutionReason::NotFound)
            .map(|f| f.title.as_str())
    }

    /// Titles that matched more than one movie
    pub fn ambiguous(&self) -> impl Iterator<Item = (&str, &[MovieId])> {
        self.failures.iter().filter_map(|f| match &f.reason {
            UnresolutionReason::Ambiguous(ids) => Some((f.title.as_str(), ids.as_slice())),
            UnresolutionReason::NotFound => None,
        })
    }
}
