//! Pipeline for filtering ranked movie candidates.
//!
//! This crate provides:
//! - Filter trait and implementations for candidate filtering
//! - FilterPipeline for composing filters
//!
//! ## Architecture
//! Engines hand over a ranked candidate list. Filters run in order and only
//! ever drop candidates, so the ranking survives untouched:
//! 1. ExcludeFavoritesFilter removes the favorites (by id and by title)
//! 2. DistinctTitleFilter keeps the best-ranked movie per title
//! 3. MinimumRatingCountFilter optionally demands rating evidence
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::FilterPipeline;
//! use pipeline::filters::*;
//!
//! // Build the filter pipeline
//! let pipeline = FilterPipeline::new()
//!     .add_filter(ExcludeFavoritesFilter::new(catalog.clone()))
//!     .add_filter(DistinctTitleFilter::new(catalog.clone()))
//!     .add_filter(MinimumRatingCountFilter::new(ratings.clone(), 10));
//!
//! // Apply filters
//! let filtered = pipeline.apply(candidates, &profile)?;
//! ```

pub mod filter_pipeline;
pub mod filters;
pub mod traits;

// Re-export main types
pub use filter_pipeline::FilterPipeline;
pub use traits::Filter;
