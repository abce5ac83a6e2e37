//! # Data Loader Crate
//!
//! This crate loads the movie datasets and builds the read-only structures
//! both recommendation engines are built on.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Movie, Rating, ImdbMetadata, Dataset)
//! - **parser**: Parse the CSV files into Rust structs
//! - **dataset**: Load all three files from a directory
//! - **catalog**: The Catalog Store (id/title lookups, selectable titles)
//! - **matrix**: The sparse rating matrix and per-movie aggregates
//! - **insights**: Summary statistics for exploring a dataset
//! - **error**: Error types for loading and title resolution
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Catalog, Dataset, RatingMatrix};
//! use std::path::Path;
//!
//! let dataset = Dataset::load_from_dir(Path::new("resources/data"))?;
//! let Dataset { movies, ratings, metadata } = dataset;
//!
//! let catalog = Catalog::new(movies, metadata);
//! let matrix = RatingMatrix::build(&ratings, &catalog);
//!
//! let heat = catalog.resolve_title("Heat (1995)")?;
//! println!("Heat was rated {} times", matrix.rating_count(heat));
//! ```

// Public modules
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod insights;
pub mod matrix;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use catalog::Catalog;
pub use error::{DataLoadError, ResolutionError, Result, UnresolutionReason, UnresolvedTitle};
pub use insights::{DatasetInsights, RatedMovie};
pub use matrix::{BuildReport, MatrixFingerprint, RatingMatrix};
pub use types::{
    // Type aliases
    UserId,
    MovieId,
    // Core types
    Movie,
    Rating,
    ImdbMetadata,
    MovieStats,
    Dataset,
    // Constants
    MAX_RATING,
    MIN_RATING,
};
