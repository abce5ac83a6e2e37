//! Neighborhood model - "users who loved your favorites also loved these"
//!
//! ## Algorithm
//! 1. For each favorite, find users who rated it highly (>= 4.0)
//! 2. Users sharing at least `min_shared_favorites` of them are neighbors,
//!    strongest overlap first, capped at `max_neighbors`
//! 3. Each neighbor votes with weight shared / favorites on every movie they
//!    rated
//! 4. score = Σ w·r / (Σ w + shrinkage), so movies backed by few neighbors
//!    are pulled toward zero
//!
//! ## Rust concepts
//! - `par_iter().fold().reduce()` for integer overlap counts, where merge
//!   order cannot change the result
//! - `par_chunks` + ordered collect + sequential merge for float sums, where
//!   it can

use super::{AffinityModel, AffinityProfile};
use crate::error::ModelConstructionError;
use data_loader::{MovieId, RatingMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const NEIGHBOR_CHUNK: usize = 64;

/// Neighborhood model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborhoodConfig {
    /// Minimum rating for a favorite to count as shared
    pub high_rating_threshold: f32,
    pub min_shared_favorites: usize,
    pub max_neighbors: usize,
    pub shrinkage: f32,
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            high_rating_threshold: 4.0,
            min_shared_favorites: 1,
            max_neighbors: 500,
            shrinkage: 10.0,
        }
    }
}

impl NeighborhoodConfig {
    /// Configure the high rating threshold (default: 4.0)
    pub fn with_high_rating_threshold(mut self, threshold: f32) -> Self {
        self.high_rating_threshold = threshold;
        self
    }

    /// Configure minimum shared favorites to consider users neighbors (default: 1)
    pub fn with_min_shared_favorites(mut self, min: usize) -> Self {
        self.min_shared_favorites = min;
        self
    }

    pub fn with_max_neighbors(mut self, max: usize) -> Self {
        self.max_neighbors = max;
        self
    }

    pub fn with_shrinkage(mut self, shrinkage: f32) -> Self {
        self.shrinkage = shrinkage;
        self
    }

    fn validate(&self) -> Result<(), ModelConstructionError> {
        if self.min_shared_favorites == 0 {
            return Err(ModelConstructionError::InvalidConfig(
                "min_shared_favorites must be at least 1".to_string(),
            ));
        }
        if self.max_neighbors == 0 {
            return Err(ModelConstructionError::InvalidConfig(
                "max_neighbors must be at least 1".to_string(),
            ));
        }
        if !self.shrinkage.is_finite() || self.shrinkage < 0.0 {
            return Err(ModelConstructionError::InvalidConfig(format!(
                "shrinkage must be a non-negative number, got {}",
                self.shrinkage
            )));
        }
        if !self.high_rating_threshold.is_finite() {
            return Err(ModelConstructionError::InvalidConfig(
                "high_rating_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// User-overlap model over the shared rating matrix
pub struct NeighborhoodModel {
    /// Shared reference to the rating matrix (read-only, so no Mutex needed)
    ratings: Arc<RatingMatrix>,
    config: NeighborhoodConfig,
}

impl NeighborhoodModel {
    pub fn new(
        ratings: Arc<RatingMatrix>,
        config: NeighborhoodConfig,
    ) -> Result<Self, ModelConstructionError> {
        config.validate()?;
        if ratings.is_empty() {
            return Err(ModelConstructionError::EmptyRatingMatrix);
        }
        Ok(Self { ratings, config })
    }

    pub fn config(&self) -> &NeighborhoodConfig {
        &self.config
    }

    /// Neighbor rows with their shared-favorite counts.
    ///
    /// Ordered by count descending, then user id ascending.
    fn find_neighbors(&self, favorite_columns: &[usize]) -> Vec<(u32, u32)> {
        let shared_counts = favorite_columns
            .par_iter()
            .fold(HashMap::new, |mut local_counts: HashMap<u32, u32>, &col| {
                for &(row, rating) in self.ratings.movie_column(col) {
                    if rating >= self.config.high_rating_threshold {
                        *local_counts.entry(row).or_insert(0) += 1;
                    }
                }
                local_counts
            })
            .reduce(HashMap::new, |mut acc, local_counts| {
                for (row, count) in local_counts {
                    *acc.entry(row).or_insert(0) += count;
                }
                acc
            });

        let mut neighbors: Vec<(u32, u32)> = shared_counts
            .into_iter()
            .filter(|&(_, count)| count as usize >= self.config.min_shared_favorites)
            .collect();

        // Rows are in ascending user id order, so row order breaks ties by user id
        neighbors.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        neighbors.truncate(self.config.max_neighbors);
        neighbors
    }

    /// Per-column weighted rating sum and weight sum over the neighbors
    fn accumulate(&self, neighbors: &[(u32, u32)], favorites: usize) -> Vec<(f64, f64)> {
        let movie_count = self.ratings.movie_count();

        let partials: Vec<Vec<(f64, f64)>> = neighbors
            .par_chunks(NEIGHBOR_CHUNK)
            .map(|chunk| {
                let mut local = vec![(0.0f64, 0.0f64); movie_count];
                for &(row, shared) in chunk {
                    let weight = shared as f64 / favorites as f64;
                    for &(col, rating) in self.ratings.user_row(row as usize) {
                        let slot = &mut local[col as usize];
                        slot.0 += weight * rating as f64;
                        slot.1 += weight;
                    }
                }
                local
            })
            .collect();

        let mut totals = vec![(0.0f64, 0.0f64); movie_count];
        for partial in partials {
            for (total, (weighted, weight)) in totals.iter_mut().zip(partial) {
                total.0 += weighted;
                total.1 += weight;
            }
        }
        totals
    }
}

impl AffinityModel for NeighborhoodModel {
    fn name(&self) -> &str {
        "neighborhood"
    }

    fn profile<'a>(&'a self, favorites: &[MovieId]) -> Box<dyn AffinityProfile + 'a> {
        let favorite_columns: Vec<usize> = favorites
            .iter()
            .filter_map(|&id| self.ratings.movie_index(id))
            .collect();

        let neighbors = self.find_neighbors(&favorite_columns);
        debug!("Found {} neighbors", neighbors.len());

        let shrinkage = self.config.shrinkage as f64;
        let scores: Vec<Option<f32>> = if neighbors.is_empty() {
            Vec::new()
        } else {
            self.accumulate(&neighbors, favorites.len().max(1))
                .into_iter()
                .map(|(weighted, weight)| {
                    (weight > 0.0).then(|| (weighted / (weight + shrinkage)) as f32)
                })
                .collect()
        };

        Box::new(NeighborhoodProfile {
            ratings: &self.ratings,
            scores,
        })
    }
}

/// Precomputed neighbor votes for every rated movie
struct NeighborhoodProfile<'a> {
    ratings: &'a RatingMatrix,
    /// Per matrix column; empty when there are no neighbors
    scores: Vec<Option<f32>>,
}

impl AffinityProfile for NeighborhoodProfile<'_> {
    fn predict(&self, candidate: MovieId) -> Option<f32> {
        let col = self.ratings.movie_index(candidate)?;
        self.scores.get(col).copied().flatten()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
