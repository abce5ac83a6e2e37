//! Errors returned by the public recommendation operations.

use data_loader::{MovieId, ResolutionError};
use std::path::PathBuf;
use thiserror::Error;

/// A recommendation request could not be served.
///
/// Resolution failures and malformed input are the caller's to fix and
/// carry enough detail to re-prompt; `Pipeline` is an internal failure.
#[derive(Error, Debug)]
pub enum RecommendError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

/// The request itself is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("expected exactly {expected} favorite titles, got {found}")]
    FavoriteCount { expected: usize, found: usize },

    /// Two titles resolved to the same movie
    #[error("favorite titles must name distinct movies (movie {movie_id} given twice)")]
    DuplicateFavorites { movie_id: MovieId },

    #[error("top_n must be between 1 and {max}, got {requested}")]
    TopN { requested: usize, max: usize },
}

/// A configuration file could not be used.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
