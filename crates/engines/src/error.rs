//! Errors raised while building engines or handling cached models.

use thiserror::Error;

/// An engine refused to initialize.
///
/// These are startup-only errors: an engine that cannot be built never
/// serves a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelConstructionError {
    #[error("catalog is empty")]
    EmptyCatalog,

    #[error("rating matrix is empty")]
    EmptyRatingMatrix,

    /// The item-feature matrix carries no information
    #[error("feature matrix is degenerate: {0}")]
    DegenerateFeatures(String),

    #[error("training produced non-finite factors after iteration {iteration}")]
    NonFiniteFactors { iteration: usize },

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// A cached model could not be read, written or used.
///
/// Never fatal: the engine retrains instead.
#[derive(Error, Debug)]
pub enum ModelCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cache was trained on other data or with other settings
    #[error("cached model does not match the current ratings or configuration")]
    Incompatible,
}
