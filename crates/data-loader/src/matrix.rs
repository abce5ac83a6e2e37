//! The Rating Matrix Builder.
//!
//! Turns raw rating records into a sparse user x movie structure:
//! - user rows: (movie column, rating) sorted by column
//! - movie columns: (user row, rating) sorted by row
//! - per-movie aggregates (mean, count, popularity) for cold-start fallback
//!
//! The matrix is built wholesale and never mutated. Construction sorts its
//! input, so the same ratings always produce the same matrix.

use crate::catalog::Catalog;
use crate::types::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Counts of what happened to the input rows during a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub accepted: usize,
    /// Rows referencing a movieId absent from the catalog
    pub unknown_movie: usize,
    /// Earlier rows for a (userId, movieId) pair that appeared again
    pub duplicate: usize,
    /// Rows with a rating outside 0.5..=5.0 or not finite
    pub out_of_range: usize,
}

/// Identity of a matrix, used to check whether a cached model still fits it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixFingerprint {
    pub users: usize,
    pub movies: usize,
    pub ratings: usize,
    pub rating_sum: f64,
}

/// Sparse user x movie rating matrix.
#[derive(Debug, Default)]
pub struct RatingMatrix {
    /// Row index -> user id (ascending)
    user_ids: Vec<UserId>,
    /// Column index -> movie id (ascending, only movies with ratings)
    movie_ids: Vec<MovieId>,
    rows: Vec<Vec<(u32, f32)>>,
    columns: Vec<Vec<(u32, f32)>>,
    /// Per column
    stats: Vec<MovieStats>,
    global_mean: f32,
    report: BuildReport,
}

impl RatingMatrix {
    /// Build the matrix from raw ratings.
    ///
    /// Ratings for movies the catalog doesn't know are dropped, as are
    /// out-of-range values. When a (user, movie) pair repeats, the rating
    /// with the latest timestamp wins; equal timestamps keep the later row.
    pub fn build(ratings: &[Rating], catalog: &Catalog) -> Self {
        let mut report = BuildReport::default();
        let mut unknown_sample: Vec<MovieId> = Vec::new();

        let mut kept: Vec<Rating> = Vec::with_capacity(ratings.len());
        for rating in ratings {
            if !catalog.contains(rating.movie_id) {
                report.unknown_movie += 1;
                if unknown_sample.len() < 5 && !unknown_sample.contains(&rating.movie_id) {
                    unknown_sample.push(rating.movie_id);
                }
                continue;
            }
            if !rating.rating.is_finite() || rating.rating < MIN_RATING || rating.rating > MAX_RATING {
                report.out_of_range += 1;
                continue;
            }
            kept.push(*rating);
        }

        // Stable sort keeps source order among identical keys
        kept.par_sort_by_key(|r| (r.user_id, r.movie_id, r.timestamp));

        let mut deduped: Vec<Rating> = Vec::with_capacity(kept.len());
        for rating in kept {
            match deduped.last_mut() {
                Some(last) if last.user_id == rating.user_id && last.movie_id == rating.movie_id => {
                    *last = rating;
                    report.duplicate += 1;
                }
                _ => deduped.push(rating),
            }
        }
        report.accepted = deduped.len();

        if report.unknown_movie > 0 {
            warn!(
                dropped = report.unknown_movie,
                sample = ?unknown_sample,
                "Dropped ratings for movies missing from the catalog"
            );
        }
        if report.out_of_range > 0 {
            warn!(dropped = report.out_of_range, "Dropped out-of-range ratings");
        }
        if report.duplicate > 0 {
            warn!(dropped = report.duplicate, "Dropped repeated (user, movie) ratings");
        }

        let mut matrix = Self::from_sorted(&deduped);
        matrix.report = report;

        info!(
            users = matrix.user_count(),
            movies = matrix.movie_count(),
            ratings = matrix.nnz(),
            "Rating matrix built"
        );
        matrix
    }

    /// Build from ratings sorted by (user, movie) with unique pairs
    fn from_sorted(ratings: &[Rating]) -> Self {
        let mut user_ids: Vec<UserId> = ratings.iter().map(|r| r.user_id).collect();
        user_ids.dedup();
        let mut movie_ids: Vec<MovieId> = ratings.iter().map(|r| r.movie_id).collect();
        movie_ids.sort_unstable();
        movie_ids.dedup();

        let mut rows: Vec<Vec<(u32, f32)>> = vec![Vec::new(); user_ids.len()];
        let mut columns: Vec<Vec<(u32, f32)>> = vec![Vec::new(); movie_ids.len()];
        let mut row = 0usize;
        let mut sum = 0.0f64;

        for rating in ratings {
            while user_ids[row] != rating.user_id {
                row += 1;
            }
            // movie_ids holds every movie in `ratings`
            let col = movie_ids
                .binary_search(&rating.movie_id)
                .unwrap_or_default();
            rows[row].push((col as u32, rating.rating));
            columns[col].push((row as u32, rating.rating));
            sum += rating.rating as f64;
        }

        let global_mean = if ratings.is_empty() {
            0.0
        } else {
            (sum / ratings.len() as f64) as f32
        };

        let stats = compute_movie_stats(&columns);

        Self {
            user_ids,
            movie_ids,
            rows,
            columns,
            stats,
            global_mean,
            report: BuildReport::default(),
        }
    }

    pub fn user_count(&self) -> usize {
        self.user_ids.len()
    }

    /// Number of movies with at least one rating
    pub fn movie_count(&self) -> usize {
        self.movie_ids.len()
    }

    /// Number of stored ratings
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }

    pub fn global_mean(&self) -> f32 {
        self.global_mean
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn user_index(&self, user_id: UserId) -> Option<usize> {
        self.user_ids.binary_search(&user_id).ok()
    }

    pub fn movie_index(&self, movie_id: MovieId) -> Option<usize> {
        self.movie_ids.binary_search(&movie_id).ok()
    }

    pub fn user_id_at(&self, row: usize) -> UserId {
        self.user_ids[row]
    }

    pub fn movie_id_at(&self, col: usize) -> MovieId {
        self.movie_ids[col]
    }

    /// Movie ids in column order
    pub fn movie_ids(&self) -> &[MovieId] {
        &self.movie_ids
    }

    /// All user rows, in row order
    pub fn rows(&self) -> &[Vec<(u32, f32)>] {
        &self.rows
    }

    /// All movie columns, in column order
    pub fn columns(&self) -> &[Vec<(u32, f32)>] {
        &self.columns
    }

    /// (movie column, rating) pairs of one user row
    pub fn user_row(&self, row: usize) -> &[(u32, f32)] {
        &self.rows[row]
    }

    /// (user row, rating) pairs of one movie column
    pub fn movie_column(&self, col: usize) -> &[(u32, f32)] {
        &self.columns[col]
    }

    /// Rating a user gave a movie, if any
    pub fn get(&self, user_id: UserId, movie_id: MovieId) -> Option<f32> {
        let row = self.user_index(user_id)?;
        let col = self.movie_index(movie_id)? as u32;
        let entries = &self.rows[row];
        entries
            .binary_search_by_key(&col, |&(c, _)| c)
            .ok()
            .map(|i| entries[i].1)
    }

    /// Get precomputed statistics for a movie
    pub fn stats(&self, movie_id: MovieId) -> Option<&MovieStats> {
        self.movie_index(movie_id).map(|col| &self.stats[col])
    }

    /// Statistics for a movie, `MovieStats::UNRATED` when nobody rated it
    pub fn stats_or_unrated(&self, movie_id: MovieId) -> MovieStats {
        self.stats(movie_id).copied().unwrap_or(MovieStats::UNRATED)
    }

    pub fn rating_count(&self, movie_id: MovieId) -> u32 {
        self.stats(movie_id).map(|s| s.rating_count).unwrap_or(0)
    }

    pub fn fingerprint(&self) -> MatrixFingerprint {
        let rating_sum = self
            .rows
            .iter()
            .flat_map(|row| row.iter().map(|&(_, r)| r as f64))
            .sum();
        MatrixFingerprint {
            users: self.user_count(),
            movies: self.movie_count(),
            ratings: self.nnz(),
            rating_sum,
        }
    }
}

/// Compute aggregate statistics for every movie column
///
/// Each column is summed sequentially; columns run in parallel and are
/// collected in column order.
fn compute_movie_stats(columns: &[Vec<(u32, f32)>]) -> Vec<MovieStats> {
    columns
        .par_iter()
        .map(|entries| {
            let rating_count = entries.len() as u32;
            let avg_rating = if rating_count > 0 {
                let total: f64 = entries.iter().map(|&(_, r)| r as f64).sum();
                (total / rating_count as f64) as f32
            } else {
                0.0
            };
            MovieStats {
                avg_rating,
                rating_count,
                popularity_score: compute_popularity_score(avg_rating, rating_count),
            }
        })
        .collect()
}

/// avg_rating * log(rating_count + 1)
///
/// Rewards both high ratings and many ratings
pub fn compute_popularity_score(avg_rating: f32, rating_count: u32) -> f32 {
    avg_rating * (rating_count as f32 + 1.0).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_catalog() -> Catalog {
        let movies = (1..=4)
            .map(|id| Movie {
                id,
                title: format!("Movie {id} (2000)"),
                year: Some(2000),
                genres: vec!["Drama".to_string()],
            })
            .collect();
        Catalog::new(movies, Vec::new())
    }

    fn rating(user_id: UserId, movie_id: MovieId, rating: f32, timestamp: i64) -> Rating {
        Rating {
            user_id,
            movie_id,
            rating,
            timestamp,
        }
    }

    #[test]
    fn test_popularity_score() {
        // High rating with few ratings
        let score1 = compute_popularity_score(4.5, 10);
        // Medium rating with many ratings
        let score2 = compute_popularity_score(3.5, 1000);

        assert!(score1 > 0.0);
        assert!(score2 > score1);
        assert_eq!(compute_popularity_score(4.0, 0), 0.0);
    }

    #[test]
    fn test_build_drops_unknown_and_out_of_range() {
        let catalog = create_test_catalog();
        let ratings = vec![
            rating(1, 1, 4.0, 10),
            rating(1, 99, 5.0, 11), // unknown movie
            rating(2, 2, 7.0, 12),  // out of range
            rating(2, 3, f32::NAN, 13),
            rating(2, 1, 3.0, 14),
        ];

        let matrix = RatingMatrix::build(&ratings, &catalog);

        assert_eq!(matrix.report().accepted, 2);
        assert_eq!(matrix.report().unknown_movie, 1);
        assert_eq!(matrix.report().out_of_range, 2);
        assert_eq!(matrix.nnz(), 2);
        assert_eq!(matrix.movie_count(), 1);
        assert_eq!(matrix.get(1, 1), Some(4.0));
        assert_eq!(matrix.get(2, 1), Some(3.0));
        assert_eq!(matrix.get(1, 99), None);
    }

    #[test]
    fn test_duplicate_pair_keeps_latest() {
        let catalog = create_test_catalog();
        let ratings = vec![
            rating(1, 1, 2.0, 200),
            rating(1, 1, 5.0, 100),
            rating(1, 1, 4.0, 300),
        ];

        let matrix = RatingMatrix::build(&ratings, &catalog);

        assert_eq!(matrix.report().duplicate, 2);
        assert_eq!(matrix.get(1, 1), Some(4.0));
    }

    #[test]
    fn test_rows_columns_and_stats() {
        let catalog = create_test_catalog();
        let ratings = vec![
            rating(7, 2, 4.0, 1),
            rating(3, 2, 2.0, 1),
            rating(3, 4, 5.0, 1),
        ];

        let matrix = RatingMatrix::build(&ratings, &catalog);

        assert_eq!(matrix.user_count(), 2);
        assert_eq!(matrix.user_id_at(0), 3);
        assert_eq!(matrix.movie_ids(), [2, 4]);
        assert_eq!(matrix.user_row(0), [(0, 2.0), (1, 5.0)]);
        assert_eq!(matrix.movie_column(0), [(0, 2.0), (1, 4.0)]);

        let stats = matrix.stats(2).unwrap();
        assert_eq!(stats.rating_count, 2);
        assert!((stats.avg_rating - 3.0).abs() < 1e-6);
        assert_eq!(matrix.rating_count(1), 0);
        assert_eq!(matrix.stats_or_unrated(1), MovieStats::UNRATED);
        assert!((matrix.global_mean() - 11.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_is_deterministic() {
        let catalog = create_test_catalog();
        let ratings: Vec<Rating> = (0..200)
            .map(|i| rating(i % 17, (i % 4) + 1, 0.5 + (i % 10) as f32 * 0.5, i as i64))
            .collect();

        let a = RatingMatrix::build(&ratings, &catalog);
        let b = RatingMatrix::build(&ratings, &catalog);

        assert_eq!(a.rows(), b.rows());
        assert_eq!(a.columns(), b.columns());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.global_mean().to_bits(), b.global_mean().to_bits());
    }

    #[test]
    fn test_empty_matrix() {
        let catalog = create_test_catalog();
        let matrix = RatingMatrix::build(&[], &catalog);

        assert!(matrix.is_empty());
        assert_eq!(matrix.nnz(), 0);
        assert_eq!(matrix.global_mean(), 0.0);
    }
}
