//! Recommender crate: the public face of the movie recommendation engine.
//!
//! This crate contains the orchestrator that coordinates the catalog, both
//! engines and the filter pipeline, plus the configuration and error types
//! callers deal with.
//!
//! ## Example Usage
//! ```ignore
//! use data_loader::Dataset;
//! use recommender::{Recommender, RecommenderConfig};
//!
//! let dataset = Dataset::load_from_dir("resources/data".as_ref())?;
//! let recommender = Recommender::build(dataset, RecommenderConfig::default())?;
//!
//! let favorites = ["Toy Story (1995)", "Jumanji (1995)", "Heat (1995)"];
//! let by_content = recommender.content_model(&favorites, 10)?;
//! let by_ratings = recommender.collab_model(&favorites, 10)?;
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::RecommenderConfig;
pub use error::{ConfigError, InvalidInput, RecommendError};
pub use orchestrator::{
    Algorithm, EmptyCandidateWarning, Recommendation, Recommender, FAVORITE_COUNT,
};
