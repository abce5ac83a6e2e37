//! Collaborative Rating Engine
//!
//! Predicts how much the owner of three favorites would like every other
//! movie, using nothing but rating patterns. The prediction itself comes from
//! a pluggable [`AffinityModel`]; this module turns predictions into a ranked
//! candidate list and handles cold start.
//!
//! ## Ranking
//! 1. Movies with a prediction, by score, then rating count, then movieId
//! 2. Movies without one (nobody rated them, or the model has no opinion),
//!    by popularity score, then rating count, then movieId
//!
//! When none of the favorites has rating history the whole list is the
//! popularity fallback.

pub mod factorization;
pub mod neighborhood;

use crate::error::ModelConstructionError;
use crate::profile::TasteProfile;
use crate::types::{rank, Candidate, CandidateSource};
use data_loader::{Catalog, MovieId, RatingMatrix};
use factorization::{FactorModel, FactorizationConfig};
use neighborhood::{NeighborhoodConfig, NeighborhoodModel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// A trained rating model that can score movies for a set of favorites
pub trait AffinityModel: Send + Sync {
    fn name(&self) -> &str;

    /// Infer a profile for a user known only by their favorites
    fn profile<'a>(&'a self, favorites: &[MovieId]) -> Box<dyn AffinityProfile + 'a>;
}

/// Affinity of one inferred user for arbitrary movies
pub trait AffinityProfile: Sync {
    /// Predicted affinity; `None` when the model knows nothing about the movie
    fn predict(&self, candidate: MovieId) -> Option<f32>;

    /// True when no favorite had rating history
    fn is_empty(&self) -> bool;
}

/// Built-in collaborative models
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Factorization,
    Neighborhood,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Factorization => write!(f, "factorization"),
            ModelKind::Neighborhood => write!(f, "neighborhood"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "factorization" | "als" => Ok(ModelKind::Factorization),
            "neighborhood" | "knn" => Ok(ModelKind::Neighborhood),
            other => Err(format!("unknown collaborative model '{}'", other)),
        }
    }
}

/// Collaborative engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborativeConfig {
    pub model: ModelKind,
    pub factorization: FactorizationConfig,
    pub neighborhood: NeighborhoodConfig,
    /// Where to cache the trained factorization model
    pub cache_path: Option<PathBuf>,
}

impl CollaborativeConfig {
    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_factorization(mut self, factorization: FactorizationConfig) -> Self {
        self.factorization = factorization;
        self
    }

    pub fn with_neighborhood(mut self, neighborhood: NeighborhoodConfig) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }
}

/// Ranks the catalog for a taste profile with an [`AffinityModel`]
pub struct CollaborativeEngine {
    catalog: Arc<Catalog>,
    ratings: Arc<RatingMatrix>,
    model: Box<dyn AffinityModel>,
}

impl CollaborativeEngine {
    /// Wrap an already trained model
    pub fn new(catalog: Arc<Catalog>, ratings: Arc<RatingMatrix>, model: Box<dyn AffinityModel>) -> Self {
        Self {
            catalog,
            ratings,
            model,
        }
    }

    /// Train the configured model
    pub fn build(
        catalog: Arc<Catalog>,
        ratings: Arc<RatingMatrix>,
        config: &CollaborativeConfig,
    ) -> Result<Self, ModelConstructionError> {
        if catalog.is_empty() {
            return Err(ModelConstructionError::EmptyCatalog);
        }
        if ratings.is_empty() {
            return Err(ModelConstructionError::EmptyRatingMatrix);
        }

        let start = Instant::now();
        let model: Box<dyn AffinityModel> = match config.model {
            ModelKind::Factorization => Box::new(FactorModel::load_or_train(
                &ratings,
                &config.factorization,
                config.cache_path.as_deref(),
            )?),
            ModelKind::Neighborhood => Box::new(NeighborhoodModel::new(
                Arc::clone(&ratings),
                config.neighborhood.clone(),
            )?),
        };

        info!(
            model = model.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Collaborative engine ready"
        );
        Ok(Self::new(catalog, ratings, model))
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Every non-favorite catalog movie, ranked
    #[instrument(skip(self, profile), fields(model = self.model.name(), favorites = ?profile.favorites))]
    pub fn get_candidates(&self, profile: &TasteProfile) -> Vec<Candidate> {
        let affinity = self.model.profile(&profile.favorites);

        let pool: Vec<MovieId> = self
            .catalog
            .movie_ids()
            .filter(|&id| !profile.is_favorite(id))
            .collect();

        if affinity.is_empty() {
            debug!("No favorite has rating history; using popularity fallback");
            return self.popularity_ranking(pool);
        }

        let predictions: Vec<(MovieId, Option<f32>)> = pool
            .par_iter()
            .map(|&id| (id, affinity.predict(id).filter(|s| s.is_finite())))
            .collect();

        let mut predicted = Vec::new();
        let mut unpredicted = Vec::new();
        for (movie_id, score) in predictions {
            match score {
                Some(score) => predicted.push(
                    Candidate::new(movie_id, CandidateSource::Collaborative, score)
                        .with_rating_count(self.ratings.rating_count(movie_id)),
                ),
                None => unpredicted.push(movie_id),
            }
        }
        rank(&mut predicted);

        debug!(
            predicted = predicted.len(),
            fallback = unpredicted.len(),
            "Scored collaborative candidates"
        );
        predicted.extend(self.popularity_ranking(unpredicted));
        predicted
    }

    /// Rank movies by popularity score, then rating count, then id
    fn popularity_ranking(&self, movie_ids: Vec<MovieId>) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = movie_ids
            .into_iter()
            .map(|id| {
                let stats = self.ratings.stats_or_unrated(id);
                Candidate::new(id, CandidateSource::Popularity, stats.popularity_score)
                    .with_rating_count(stats.rating_count)
            })
            .collect();
        rank(&mut candidates);
        candidates
    }
}
