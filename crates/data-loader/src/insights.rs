//! Dataset insights.
//!
//! Aggregates behind the exploratory views of the dataset: how ratings are
//! distributed, when they were made, which genres dominate the catalog and
//! when the movies were released. Only numbers are produced here; rendering
//! is up to the caller.

use crate::catalog::Catalog;
use crate::matrix::RatingMatrix;
use crate::types::*;
use chrono::{DateTime, Datelike};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A most-rated movie entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedMovie {
    pub movie_id: MovieId,
    pub title: String,
    pub rating_count: u32,
    pub avg_rating: f32,
}

/// Summary statistics of a dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetInsights {
    /// Half-star bucket (rating * 2, so 1..=10) -> count
    pub rating_distribution: BTreeMap<u8, u64>,
    /// Calendar year (UTC) the rating was made -> count
    pub ratings_per_year: BTreeMap<i32, u64>,
    /// (genre, number of movies) sorted by count desc, then name
    pub genre_counts: Vec<(String, usize)>,
    /// Release year -> number of movies
    pub movies_per_release_year: BTreeMap<u16, usize>,
    /// Movies whose title carries no release year
    pub undated_movies: usize,
    /// Most-rated movies, by count desc then id
    pub most_rated: Vec<RatedMovie>,
}

impl DatasetInsights {
    /// Compute insights over the catalog, the built matrix and the raw ratings.
    ///
    /// Raw ratings are only used for timestamps. Every count, including
    /// ratings per year, covers only the ratings the matrix kept: rows for
    /// unknown movies, out-of-range values and superseded repeats of a
    /// (user, movie) pair are left out.
    pub fn compute(catalog: &Catalog, matrix: &RatingMatrix, ratings: &[Rating], top: usize) -> Self {
        let mut insights = DatasetInsights::default();

        for row in matrix.rows() {
            for &(_, rating) in row {
                let bucket = (rating * 2.0).round() as u8;
                *insights.rating_distribution.entry(bucket).or_insert(0) += 1;
            }
        }

        // Latest timestamp per pair, the same row the matrix keeps
        let mut kept: HashMap<(UserId, MovieId), i64> = HashMap::new();
        for rating in ratings.iter().filter(|r| is_kept(r, catalog)) {
            kept.entry((rating.user_id, rating.movie_id))
                .and_modify(|t| *t = (*t).max(rating.timestamp))
                .or_insert(rating.timestamp);
        }
        for timestamp in kept.into_values() {
            if let Some(when) = DateTime::from_timestamp(timestamp, 0) {
                *insights.ratings_per_year.entry(when.year()).or_insert(0) += 1;
            }
        }

        let mut genre_counts: HashMap<&str, usize> = HashMap::new();
        for movie in catalog.movies() {
            for genre in &movie.genres {
                *genre_counts.entry(genre.as_str()).or_insert(0) += 1;
            }
            match movie.year {
                Some(year) => *insights.movies_per_release_year.entry(year).or_insert(0) += 1,
                None => insights.undated_movies += 1,
            }
        }
        let mut genre_counts: Vec<(String, usize)> = genre_counts
            .into_iter()
            .map(|(genre, count)| (genre.to_string(), count))
            .collect();
        genre_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        insights.genre_counts = genre_counts;

        let mut most_rated: Vec<RatedMovie> = matrix
            .movie_ids()
            .iter()
            .filter_map(|&movie_id| {
                let stats = matrix.stats(movie_id)?;
                Some(RatedMovie {
                    movie_id,
                    title: catalog.title(movie_id)?.to_string(),
                    rating_count: stats.rating_count,
                    avg_rating: stats.avg_rating,
                })
            })
            .collect();
        most_rated.sort_by(|a, b| {
            b.rating_count
                .cmp(&a.rating_count)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        most_rated.truncate(top);
        insights.most_rated = most_rated;

        insights
    }
}

fn is_kept(rating: &Rating, catalog: &Catalog) -> bool {
    catalog.contains(rating.movie_id)
        && rating.rating.is_finite()
        && (MIN_RATING..=MAX_RATING).contains(&rating.rating)
}
