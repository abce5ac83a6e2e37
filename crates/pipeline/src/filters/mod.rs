//! Filter implementations for the candidate pipeline.
//!
//! This module contains all the concrete filter implementations
//! that can be composed into a FilterPipeline.

pub mod distinct_title;
pub mod exclude_favorites;
pub mod minimum_rating;

// Re-export for convenience
pub use distinct_title::DistinctTitleFilter;
pub use exclude_favorites::ExcludeFavoritesFilter;
pub use minimum_rating::MinimumRatingCountFilter;
