//! Core domain types for the movie datasets.
//!
//! This module defines the records the loader delivers:
//! - `Movie` from movies.csv
//! - `Rating` from ratings.csv
//! - `ImdbMetadata` from imdb_data.csv
//! - `MovieStats`, the per-movie aggregates computed from ratings
//! - `Dataset`, the three tables handed to `Recommender::build`

use serde::{Deserialize, Serialize};

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with movie IDs

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a movie
pub type MovieId = u32;

/// Genre cell value MovieLens uses for movies without any genre
pub const NO_GENRES_LISTED: &str = "(no genres listed)";

/// Lowest rating accepted into the rating matrix
pub const MIN_RATING: f32 = 0.5;

/// Highest rating accepted into the rating matrix
pub const MAX_RATING: f32 = 5.0;

// =============================================================================
// Movie-related Types
// =============================================================================

/// Represents a movie in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Year extracted from title (e.g., "Toy Story (1995)")
    ///
    /// `None` when the title carries no parenthesized four-digit year
    pub year: Option<u16>,
    /// Genre tags in source order
    ///
    /// Tags are kept as strings: the vocabulary is whatever the catalog uses,
    /// so newer MovieLens tags such as "IMAX" need no code change.
    pub genres: Vec<String>,
}

/// Auxiliary IMDb metadata for a movie
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImdbMetadata {
    pub movie_id: MovieId,
    /// Normalized budget; 0 when missing or unparseable
    pub budget: u64,
    pub director: Option<String>,
    pub cast: Vec<String>,
    pub plot_keywords: Vec<String>,
    /// Runtime in minutes
    pub runtime: Option<f32>,
}

// =============================================================================
// Rating Type
// =============================================================================

/// Represents a single rating from a user for a movie
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// Rating value from 0.5 to 5.0 in half-star steps
    pub rating: f32,
    /// Unix timestamp when rating was made
    pub timestamp: i64,
}

// =============================================================================
// Statistics Types
// =============================================================================

/// Precomputed statistics for a movie
///
/// These are computed once when the rating matrix is built
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovieStats {
    pub avg_rating: f32,
    pub rating_count: u32,
    /// Popularity score derived from rating count and average
    pub popularity_score: f32,
}

impl MovieStats {
    /// Stats for a movie nobody rated
    pub const UNRATED: MovieStats = MovieStats {
        avg_rating: 0.0,
        rating_count: 0,
        popularity_score: 0.0,
    };
}

// =============================================================================
// Dataset - the raw tables
// =============================================================================

/// The three tables as delivered by the loader.
///
/// This is a plain value: nothing is indexed yet. `Catalog::new` and
/// `RatingMatrix::build` turn it into the read-only structures the engines use.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub movies: Vec<Movie>,
    pub ratings: Vec<Rating>,
    pub metadata: Vec<ImdbMetadata>,
}

impl Dataset {
    pub fn new(movies: Vec<Movie>, ratings: Vec<Rating>, metadata: Vec<ImdbMetadata>) -> Self {
        Self {
            movies,
            ratings,
            metadata,
        }
    }

    /// Get counts for debugging/validation
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.movies.len(), self.ratings.len(), self.metadata.len())
    }
}
