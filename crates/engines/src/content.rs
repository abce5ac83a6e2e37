//! Content Similarity Engine
//!
//! Recommends movies that look like the favorites on paper:
//! "You liked three adventure cartoons, here are more adventure cartoons"
//!
//! ## Algorithm
//! 1. Turn every movie into a bag of feature tokens (`genre:Comedy`, and with
//!    metadata text enabled `director:..`, `cast:..`, `keyword:..`)
//! 2. Weight tokens (one-hot or TF-IDF) and L2-normalize each vector
//! 3. Cosine similarity between two movies is the dot product of their vectors
//! 4. For each favorite take its top-K neighbors, sum scores per candidate
//! 5. Rank by summed score, then rating count, then movieId
//!
//! ## Rust concepts
//! - The similarity matrix is kept in factored form (one sparse row per
//!   movie plus an inverted index), so memory grows with the catalog, not
//!   with its square
//! - `par_iter().map().collect()` preserves input order, which keeps the
//!   parallel build deterministic

use crate::error::ModelConstructionError;
use crate::profile::TasteProfile;
use crate::types::{rank, top_k, Candidate, CandidateSource};
use data_loader::{Catalog, Movie, MovieId, RatingMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// How feature tokens are weighted before normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureWeighting {
    /// Every present token weighs 1
    OneHot,
    /// Rare tokens weigh more: idf = ln((1 + n) / (1 + df)) + 1
    #[default]
    TfIdf,
}

/// Content engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub weighting: FeatureWeighting,
    /// Add director, cast and plot keyword tokens from IMDb metadata
    pub include_metadata_text: bool,
    /// Multiplier applied to metadata tokens
    pub metadata_weight: f32,
    /// Neighbors taken per favorite; raised to `top_n + 3` when smaller
    pub neighbors_per_favorite: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            weighting: FeatureWeighting::TfIdf,
            include_metadata_text: false,
            metadata_weight: 0.5,
            neighbors_per_favorite: 40,
        }
    }
}

impl ContentConfig {
    pub fn with_weighting(mut self, weighting: FeatureWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn with_metadata_text(mut self, include: bool) -> Self {
        self.include_metadata_text = include;
        self
    }

    pub fn with_metadata_weight(mut self, weight: f32) -> Self {
        self.metadata_weight = weight;
        self
    }

    pub fn with_neighbors_per_favorite(mut self, k: usize) -> Self {
        self.neighbors_per_favorite = k;
        self
    }

    fn validate(&self) -> Result<(), ModelConstructionError> {
        if !self.metadata_weight.is_finite() || self.metadata_weight < 0.0 {
            return Err(ModelConstructionError::InvalidConfig(format!(
                "metadata_weight must be a non-negative number, got {}",
                self.metadata_weight
            )));
        }
        Ok(())
    }
}

/// Pairwise cosine similarity between catalog movies.
///
/// Symmetric, entries in [0, 1], diagonal exactly 1.0. Stored as one
/// normalized sparse feature vector per movie; an entry is computed on
/// demand as the dot product of two rows.
#[derive(Debug)]
pub struct SimilarityMatrix {
    /// Row index -> movie id (ascending)
    ids: Vec<MovieId>,
    /// Row -> (feature, weight), sorted by feature, unit length
    rows: Vec<Vec<(u32, f32)>>,
    /// Feature -> (row, weight), sorted by row
    postings: Vec<Vec<(u32, f32)>>,
}

impl SimilarityMatrix {
    /// Build feature vectors for every catalog movie
    pub fn build(catalog: &Catalog, config: &ContentConfig) -> Result<Self, ModelConstructionError> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(ModelConstructionError::EmptyCatalog);
        }

        let movies: Vec<&Movie> = catalog.movies().collect();
        let ids: Vec<MovieId> = movies.iter().map(|m| m.id).collect();

        // Step 1: tokens per movie
        let tokens: Vec<BTreeMap<String, f32>> = movies
            .par_iter()
            .map(|movie| movie_tokens(catalog, movie, config))
            .collect();

        // Step 2: sorted vocabulary and document frequencies
        let mut document_frequency: BTreeMap<&str, u32> = BTreeMap::new();
        for bag in &tokens {
            for token in bag.keys() {
                *document_frequency.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        if document_frequency.is_empty() {
            return Err(ModelConstructionError::DegenerateFeatures(
                "no movie has any feature token".to_string(),
            ));
        }

        let n = movies.len() as f32;
        let vocabulary: HashMap<&str, (u32, f32)> = document_frequency
            .iter()
            .enumerate()
            .map(|(index, (&token, &df))| {
                let weight = match config.weighting {
                    FeatureWeighting::OneHot => 1.0,
                    FeatureWeighting::TfIdf => ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0,
                };
                (token, (index as u32, weight))
            })
            .collect();

        // Step 3: weighted, normalized rows
        let rows: Vec<Vec<(u32, f32)>> = tokens
            .par_iter()
            .map(|bag| {
                // BTreeMap keys come out sorted, and indices follow the sorted vocabulary
                let mut row: Vec<(u32, f32)> = bag
                    .iter()
                    .filter_map(|(token, &base)| {
                        let &(index, weight) = vocabulary.get(token.as_str())?;
                        let value = base * weight;
                        (value > 0.0).then_some((index, value))
                    })
                    .collect();
                normalize(&mut row);
                row
            })
            .collect();

        if rows.iter().all(|row| row.is_empty()) {
            return Err(ModelConstructionError::DegenerateFeatures(
                "every feature vector is zero".to_string(),
            ));
        }

        let mut postings: Vec<Vec<(u32, f32)>> = vec![Vec::new(); document_frequency.len()];
        for (row_index, row) in rows.iter().enumerate() {
            for &(feature, value) in row {
                postings[feature as usize].push((row_index as u32, value));
            }
        }

        Ok(Self {
            ids,
            rows,
            postings,
        })
    }

    /// Number of movies covered
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    fn row_of(&self, movie_id: MovieId) -> Option<usize> {
        self.ids.binary_search(&movie_id).ok()
    }

    /// Cosine similarity of two movies; 0.0 when either is unknown
    pub fn similarity(&self, a: MovieId, b: MovieId) -> f32 {
        let (Some(row_a), Some(row_b)) = (self.row_of(a), self.row_of(b)) else {
            return 0.0;
        };
        if row_a == row_b {
            return 1.0;
        }
        sparse_dot(&self.rows[row_a], &self.rows[row_b]).clamp(0.0, 1.0)
    }

    /// Similarity of one movie to every movie, in row order
    fn similarity_row(&self, row: usize) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.ids.len()];
        for &(feature, value) in &self.rows[row] {
            for &(other, other_value) in &self.postings[feature as usize] {
                scores[other as usize] += value * other_value;
            }
        }
        for score in scores.iter_mut() {
            *score = score.clamp(0.0, 1.0);
        }
        scores[row] = 1.0;
        scores
    }
}

/// Feature tokens of one movie with their base weights
fn movie_tokens(catalog: &Catalog, movie: &Movie, config: &ContentConfig) -> BTreeMap<String, f32> {
    let mut bag = BTreeMap::new();
    for genre in &movie.genres {
        bag.insert(format!("genre:{}", genre), 1.0);
    }

    if config.include_metadata_text
        && let Some(meta) = catalog.metadata(movie.id)
    {
        let text_weight = config.metadata_weight;
        if let Some(director) = &meta.director {
            bag.insert(format!("director:{}", director.to_lowercase()), text_weight);
        }
        for name in &meta.cast {
            bag.insert(format!("cast:{}", name.to_lowercase()), text_weight);
        }
        for keyword in &meta.plot_keywords {
            bag.insert(format!("keyword:{}", keyword.to_lowercase()), text_weight);
        }
    }
    bag
}

fn normalize(row: &mut [(u32, f32)]) {
    let norm = row.iter().map(|&(_, v)| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, v) in row.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product of two feature-sorted sparse vectors
fn sparse_dot(a: &[(u32, f32)], b: &[(u32, f32)]) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Content-based candidate generator
pub struct ContentEngine {
    catalog: Arc<Catalog>,
    /// Only used for the rating-count tie break
    ratings: Arc<RatingMatrix>,
    similarities: SimilarityMatrix,
    config: ContentConfig,
}

impl ContentEngine {
    /// Build the similarity matrix for the whole catalog
    pub fn build(
        catalog: Arc<Catalog>,
        ratings: Arc<RatingMatrix>,
        config: ContentConfig,
    ) -> Result<Self, ModelConstructionError> {
        let start = Instant::now();
        let similarities = SimilarityMatrix::build(&catalog, &config)?;

        info!(
            movies = similarities.len(),
            vocabulary = similarities.vocabulary_size(),
            weighting = ?config.weighting,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Content engine ready"
        );

        Ok(Self {
            catalog,
            ratings,
            similarities,
            config,
        })
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn similarity_matrix(&self) -> &SimilarityMatrix {
        &self.similarities
    }

    pub fn similarity(&self, a: MovieId, b: MovieId) -> f32 {
        self.similarities.similarity(a, b)
    }

    /// The `k` movies most similar to `movie_id`, best first, excluding itself
    pub fn similar_to(&self, movie_id: MovieId, k: usize) -> Vec<Candidate> {
        let Some(row) = self.similarities.row_of(movie_id) else {
            return Vec::new();
        };
        top_k(self.neighbors(row, |id| id == movie_id), k)
    }

    /// Neighbors taken per favorite for a request of `top_n` titles
    pub fn neighbor_count(&self, top_n: usize) -> usize {
        self.config.neighbors_per_favorite.max(top_n + 3)
    }

    /// Ranked candidate pool for a taste profile.
    ///
    /// Each favorite contributes its top `max(neighbors_per_favorite,
    /// top_n + 3)` neighbors and scores are summed per movie. Favorites never
    /// appear. The pool is ranked but not truncated to `top_n`.
    pub fn get_candidates(&self, profile: &TasteProfile, top_n: usize) -> Vec<Candidate> {
        self.candidates_with_neighbors(profile, self.neighbor_count(top_n))
    }

    /// Like [`get_candidates`](Self::get_candidates) with an explicit
    /// per-favorite neighbor count. A `k` at least the catalog size puts
    /// every non-favorite movie in the pool.
    #[instrument(skip(self, profile), fields(favorites = ?profile.favorites))]
    pub fn candidates_with_neighbors(&self, profile: &TasteProfile, k: usize) -> Vec<Candidate> {

        let mut seen = HashSet::new();
        let favorites: Vec<MovieId> = profile
            .favorites
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        // Per-favorite neighbor lists in favorite order
        let neighbor_lists: Vec<Vec<Candidate>> = favorites
            .par_iter()
            .filter_map(|&favorite| self.similarities.row_of(favorite))
            .map(|row| top_k(self.neighbors(row, |id| profile.is_favorite(id)), k))
            .collect();

        let mut summed: BTreeMap<MovieId, f32> = BTreeMap::new();
        for list in &neighbor_lists {
            for candidate in list {
                *summed.entry(candidate.movie_id).or_insert(0.0) += candidate.score;
            }
        }

        let mut ranked: Vec<Candidate> = summed
            .into_iter()
            .map(|(movie_id, score)| self.candidate(movie_id, score))
            .collect();
        rank(&mut ranked);

        debug!(
            neighbors_per_favorite = k,
            candidates = ranked.len(),
            "Generated content candidates"
        );
        ranked
    }

    /// Every movie other than the excluded ones, scored against `row`
    fn neighbors(&self, row: usize, excluded: impl Fn(MovieId) -> bool) -> Vec<Candidate> {
        self.similarities
            .similarity_row(row)
            .into_iter()
            .zip(&self.similarities.ids)
            .filter(|&(_, &id)| !excluded(id))
            .map(|(score, &id)| self.candidate(id, score))
            .collect()
    }

    fn candidate(&self, movie_id: MovieId, score: f32) -> Candidate {
        Candidate::new(movie_id, CandidateSource::Content, score)
            .with_rating_count(self.ratings.rating_count(movie_id))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{ImdbMetadata, Rating};

    fn movie(id: MovieId, title: &str, genres: &[&str]) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            year: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn create_test_catalog() -> Catalog {
        let movies = vec![
            movie(1, "Toy Story (1995)", &["Adventure", "Animation", "Children", "Comedy", "Fantasy"]),
            movie(2, "Jumanji (1995)", &["Adventure", "Children", "Fantasy"]),
            movie(3, "Grumpier Old Men (1995)", &["Comedy", "Romance"]),
            movie(4, "Heat (1995)", &["Action", "Crime", "Thriller"]),
            movie(5, "Casino (1995)", &["Crime", "Drama"]),
            movie(6, "Toy Story 2 (1999)", &["Adventure", "Animation", "Children", "Comedy", "Fantasy"]),
            movie(7, "Balto (1995)", &["Adventure", "Animation", "Children"]),
            movie(8, "Unlabeled (2001)", &[]),
        ];
        Catalog::new(movies, Vec::new())
    }

    fn create_engine(config: ContentConfig) -> ContentEngine {
        let catalog = Arc::new(create_test_catalog());
        let ratings = vec![Rating { user_id: 1, movie_id: 6, rating: 4.0, timestamp: 0 }];
        let matrix = Arc::new(RatingMatrix::build(&ratings, &catalog));
        ContentEngine::build(catalog, matrix, config).unwrap()
    }

    #[test]
    fn test_self_similarity_is_maximum() {
        let engine = create_engine(ContentConfig::default());
        for id in 1..=8 {
            assert_eq!(engine.similarity(id, id), 1.0);
            for other in 1..=8 {
                let s = engine.similarity(id, other);
                assert!((0.0..=1.0).contains(&s));
                assert_eq!(s, engine.similarity(other, id));
            }
        }
        // identical genre sets
        assert!((engine.similarity(1, 6) - 1.0).abs() < 1e-5);
        // no shared genre
        assert_eq!(engine.similarity(1, 4), 0.0);
        // a movie without features matches nothing else
        assert_eq!(engine.similarity(8, 1), 0.0);
    }

    #[test]
    fn test_unknown_movie_similarity() {
        let engine = create_engine(ContentConfig::default());
        assert_eq!(engine.similarity(1, 999), 0.0);
        assert!(engine.similar_to(999, 5).is_empty());
    }

    #[test]
    fn test_similar_to() {
        let engine = create_engine(ContentConfig::default());
        let similar = engine.similar_to(1, 3);
        let ids: Vec<MovieId> = similar.iter().map(|c| c.movie_id).collect();
        assert_eq!(ids[0], 6);
        assert!(!ids.contains(&1));
        assert_eq!(similar.len(), 3);
    }

    #[test]
    fn test_get_candidates_skews_to_family() {
        let engine = create_engine(ContentConfig::default());
        let catalog = create_test_catalog();
        let profile = TasteProfile::new(&catalog, vec![1, 2, 4]);

        let candidates = engine.get_candidates(&profile, 3);
        let ids: Vec<MovieId> = candidates.iter().map(|c| c.movie_id).collect();

        assert_eq!(ids[0], 6);
        assert_eq!(ids[1], 7);
        assert!(!ids.iter().any(|id| profile.is_favorite(*id)));
        // K >= top_n + 3 covers the whole catalog here
        assert_eq!(candidates.len(), 5);
        assert!(candidates.iter().all(|c| c.source == CandidateSource::Content));
    }

    #[test]
    fn test_get_candidates_is_deterministic() {
        let engine = create_engine(ContentConfig::default().with_neighbors_per_favorite(2));
        let catalog = create_test_catalog();
        let profile = TasteProfile::new(&catalog, vec![1, 2, 4]);

        let first = engine.get_candidates(&profile, 2);
        for _ in 0..5 {
            assert_eq!(engine.get_candidates(&profile, 2), first);
        }
    }

    #[test]
    fn test_neighbor_count_bounds_pool() {
        let engine = create_engine(ContentConfig::default().with_neighbors_per_favorite(1));
        let catalog = create_test_catalog();
        let profile = TasteProfile::new(&catalog, vec![1, 2, 4]);

        assert_eq!(engine.neighbor_count(0), 3);
        assert_eq!(engine.neighbor_count(10), 13);

        // one neighbor each: Toy Story 2 for the cartoons, Casino for Heat
        let small = engine.candidates_with_neighbors(&profile, 1);
        let ids: Vec<MovieId> = small.iter().map(|c| c.movie_id).collect();
        assert_eq!(ids, vec![6, 5]);

        let full = engine.candidates_with_neighbors(&profile, catalog.len());
        assert_eq!(full.len(), catalog.len() - 3);
    }

    #[test]
    fn test_one_hot_weighting() {
        let engine = create_engine(ContentConfig::default().with_weighting(FeatureWeighting::OneHot));
        // Jumanji's genres are a subset of Toy Story's: 3 / sqrt(3 * 5)
        let expected = 3.0 / (15.0f32).sqrt();
        assert!((engine.similarity(1, 2) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_metadata_tokens() {
        let movies = vec![
            movie(1, "A (2000)", &["Drama"]),
            movie(2, "B (2000)", &["Drama"]),
            movie(3, "C (2000)", &["Drama"]),
        ];
        let metadata = vec![
            ImdbMetadata {
                movie_id: 1,
                director: Some("Michael Mann".to_string()),
                ..Default::default()
            },
            ImdbMetadata {
                movie_id: 2,
                director: Some("Michael Mann".to_string()),
                ..Default::default()
            },
        ];
        let catalog = Catalog::new(movies, metadata);
        let config = ContentConfig::default().with_metadata_text(true);
        let similarities = SimilarityMatrix::build(&catalog, &config).unwrap();

        assert!(similarities.similarity(1, 2) > similarities.similarity(1, 3));
        assert_eq!(similarities.vocabulary_size(), 2);
    }

    #[test]
    fn test_degenerate_features() {
        let catalog = Catalog::new(vec![movie(1, "A (2000)", &[]), movie(2, "B (2000)", &[])], Vec::new());
        let err = SimilarityMatrix::build(&catalog, &ContentConfig::default()).unwrap_err();
        assert!(matches!(err, ModelConstructionError::DegenerateFeatures(_)));
    }

    #[test]
    fn test_empty_catalog() {
        let err = SimilarityMatrix::build(&Catalog::default(), &ContentConfig::default()).unwrap_err();
        assert_eq!(err, ModelConstructionError::EmptyCatalog);
    }

    #[test]
    fn test_invalid_metadata_weight() {
        let config = ContentConfig::default().with_metadata_weight(-1.0);
        let err = SimilarityMatrix::build(&create_test_catalog(), &config).unwrap_err();
        assert!(matches!(err, ModelConstructionError::InvalidConfig(_)));
    }
}
