//! Filter to require a minimum amount of rating evidence.
//!
//! Removes movies too few people rated, so obscure titles with a lucky score
//! don't crowd out established ones. Disabled when the minimum is 0.

use crate::traits::Filter;
use anyhow::Result;
use data_loader::RatingMatrix;
use engines::{Candidate, TasteProfile};
use std::sync::Arc;

/// Removes candidates with fewer than `min_count` ratings.
///
/// ## Algorithm
/// For each candidate:
/// 1. Get MovieStats from the RatingMatrix (unrated movies count 0)
/// 2. Keep only if rating_count >= min_count
pub struct MinimumRatingCountFilter {
    ratings: Arc<RatingMatrix>,
    min_count: u32,
}

impl MinimumRatingCountFilter {
    /// Create a new MinimumRatingCountFilter.
    ///
    /// # Arguments
    /// * `ratings` - Shared reference to the RatingMatrix for stats lookups
    /// * `min_count` - Minimum number of ratings
    pub fn new(ratings: Arc<RatingMatrix>, min_count: u32) -> Self {
        Self { ratings, min_count }
    }
}

impl Filter for MinimumRatingCountFilter {
    fn name(&self) -> &str {
        "MinimumRatingCountFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, _profile: &TasteProfile) -> Result<Vec<Candidate>> {
        if self.min_count == 0 {
            return Ok(candidates);
        }
        let filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| self.ratings.rating_count(candidate.movie_id) >= self.min_count)
            .collect();

        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Catalog, Movie, Rating};
    use engines::CandidateSource;

    fn create_test_matrix() -> Arc<RatingMatrix> {
        let movies = (1..=3)
            .map(|id| Movie {
                id,
                title: format!("Movie {}", id),
                year: Some(2000),
                genres: vec![],
            })
            .collect();
        let catalog = Catalog::new(movies, Vec::new());

        let mut ratings = Vec::new();
        // Movie 1: many ratings
        for i in 0..20 {
            ratings.push(Rating {
                user_id: i,
                movie_id: 1,
                rating: 4.5,
                timestamp: 1000000,
            });
        }
        // Movie 2: too few ratings; movie 3: none
        for i in 0..5 {
            ratings.push(Rating {
                user_id: i + 200,
                movie_id: 2,
                rating: 4.5,
                timestamp: 1000000,
            });
        }
        Arc::new(RatingMatrix::build(&ratings, &catalog))
    }

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new(1, CandidateSource::Content, 0.9),
            Candidate::new(2, CandidateSource::Content, 0.8),
            Candidate::new(3, CandidateSource::Content, 0.7),
        ]
    }

    #[test]
    fn test_minimum_rating_count_filter() {
        let filter = MinimumRatingCountFilter::new(create_test_matrix(), 10);
        let filtered = filter.apply(candidates(), &TasteProfile::default()).unwrap();

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].movie_id, 1);
    }

    #[test]
    fn test_zero_minimum_keeps_everything() {
        let filter = MinimumRatingCountFilter::new(create_test_matrix(), 0);
        let filtered = filter.apply(candidates(), &TasteProfile::default()).unwrap();
        assert_eq!(filtered.len(), 3);
    }
}
