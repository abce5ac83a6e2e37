//! Candidate types shared by both engines and the filter pipeline.

use data_loader::MovieId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which signal produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateSource {
    /// Similarity of descriptive metadata
    Content,
    /// Prediction from rating patterns
    Collaborative,
    /// Popularity fallback when no prediction exists
    Popularity,
}

/// A movie eligible for recommendation, with its ranking score.
///
/// The score only orders candidates of the same source; it is never shown
/// to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub movie_id: MovieId,
    pub source: CandidateSource,
    pub score: f32,
    /// Global popularity proxy used to break score ties
    pub rating_count: u32,
}

impl Candidate {
    pub fn new(movie_id: MovieId, source: CandidateSource, score: f32) -> Self {
        Self {
            movie_id,
            source,
            score,
            rating_count: 0,
        }
    }

    pub fn with_rating_count(mut self, rating_count: u32) -> Self {
        self.rating_count = rating_count;
        self
    }
}

/// Ranking order: score descending, then rating count descending, then
/// movieId ascending.
///
/// This is a total order over candidates with distinct ids, so sorting with
/// it never depends on input order.
pub fn ranking_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.rating_count.cmp(&a.rating_count))
        .then_with(|| a.movie_id.cmp(&b.movie_id))
}

/// Sort candidates in ranking order
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_unstable_by(ranking_order);
}

/// Keep the best `k` candidates, in ranking order
pub fn top_k(mut candidates: Vec<Candidate>, k: usize) -> Vec<Candidate> {
    if k == 0 {
        return Vec::new();
    }
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, ranking_order);
        candidates.truncate(k);
    }
    rank(&mut candidates);
    candidates
}
