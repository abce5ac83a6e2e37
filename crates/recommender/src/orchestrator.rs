//! # Recommendation Orchestrator
//!
//! Public entry point. A request runs through:
//! 1. Validate the input shape (three titles, sane `top_n`)
//! 2. Resolve titles into a TasteProfile
//! 3. Generate ranked candidates with the chosen engine
//! 4. Apply filters (favorites, distinct titles, optional rating count)
//! 5. Truncate to `top_n` and report any shortfall
//!
//! Everything shared between requests is built once in
//! [`Recommender::build`] and never mutated, so one `Recommender` behind an
//! `Arc` serves concurrent requests without locks.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use data_loader::{Catalog, Dataset, MovieId, RatingMatrix};
use engines::{
    build_taste_profile, AffinityModel, Candidate, CollaborativeEngine, ContentEngine,
    ModelConstructionError, TasteProfile,
};
use pipeline::filters::{DistinctTitleFilter, ExcludeFavoritesFilter, MinimumRatingCountFilter};
use pipeline::FilterPipeline;

use crate::config::RecommenderConfig;
use crate::error::{InvalidInput, RecommendError};

/// Number of favorites every request must supply
pub const FAVORITE_COUNT: usize = 3;

/// Which engine answers a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Content,
    Collaborative,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Content => write!(f, "content"),
            Algorithm::Collaborative => write!(f, "collaborative"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" => Ok(Algorithm::Content),
            "collab" | "collaborative" => Ok(Algorithm::Collaborative),
            other => Err(format!("unknown algorithm '{}'", other)),
        }
    }
}

/// Fewer than the requested number of titles survived filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyCandidateWarning {
    pub requested: usize,
    pub available: usize,
}

impl fmt::Display for EmptyCandidateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "only {} of {} requested recommendations available",
            self.available, self.requested
        )
    }
}

/// Final recommendation returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Titles, best first
    pub titles: Vec<String>,
    /// Movie ids matching `titles` position by position
    pub movie_ids: Vec<MovieId>,
    pub algorithm: Algorithm,
    pub shortfall: Option<EmptyCandidateWarning>,
}

impl Recommendation {
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Main orchestrator that owns both engines and the filter pipeline
pub struct Recommender {
    catalog: Arc<Catalog>,
    ratings: Arc<RatingMatrix>,
    content: ContentEngine,
    collaborative: CollaborativeEngine,
    filter_pipeline: FilterPipeline,
    config: RecommenderConfig,
}

impl Recommender {
    /// Build the catalog, rating matrix and both engines.
    ///
    /// The engines are independent and built in parallel. Any engine that
    /// cannot be built fails the whole startup.
    pub fn build(dataset: Dataset, config: RecommenderConfig) -> Result<Self, ModelConstructionError> {
        let start = Instant::now();
        let Dataset {
            movies,
            ratings,
            metadata,
        } = dataset;

        let catalog = Arc::new(Catalog::new(movies, metadata));
        if catalog.is_empty() {
            return Err(ModelConstructionError::EmptyCatalog);
        }
        let matrix = Arc::new(RatingMatrix::build(&ratings, &catalog));
        drop(ratings);

        let (content, collaborative) = rayon::join(
            || ContentEngine::build(catalog.clone(), matrix.clone(), config.content.clone()),
            || CollaborativeEngine::build(catalog.clone(), matrix.clone(), &config.collaborative),
        );
        let content = content?;
        let collaborative = collaborative?;

        let filter_pipeline = Self::build_pipeline(&catalog, &matrix, config.min_rating_count);

        info!(
            movies = catalog.len(),
            users = matrix.user_count(),
            ratings = matrix.nnz(),
            collaborative_model = collaborative.model_name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommender ready"
        );

        Ok(Self {
            catalog,
            ratings: matrix,
            content,
            collaborative,
            filter_pipeline,
            config,
        })
    }

    fn build_pipeline(catalog: &Arc<Catalog>, ratings: &Arc<RatingMatrix>, min_rating_count: u32) -> FilterPipeline {
        let pipeline = FilterPipeline::new()
            .add_filter(ExcludeFavoritesFilter::new(catalog.clone()))
            .add_filter(DistinctTitleFilter::new(catalog.clone()));
        if min_rating_count > 0 {
            pipeline.add_filter(MinimumRatingCountFilter::new(ratings.clone(), min_rating_count))
        } else {
            pipeline
        }
    }

    /// Swap the collaborative model for an already trained one
    pub fn with_collaborative_model(mut self, model: Box<dyn AffinityModel>) -> Self {
        info!(model = model.name(), "Replacing collaborative model");
        self.collaborative = CollaborativeEngine::new(self.catalog.clone(), self.ratings.clone(), model);
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn ratings(&self) -> &Arc<RatingMatrix> {
        &self.ratings
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn content_engine(&self) -> &ContentEngine {
        &self.content
    }

    pub fn collaborative_model_name(&self) -> &str {
        self.collaborative.model_name()
    }

    /// Largest valid `top_n`: the catalog minus the favorites
    pub fn max_top_n(&self) -> usize {
        self.catalog.len().saturating_sub(FAVORITE_COUNT)
    }

    /// Up to `top_n` movies resembling the favorites
    pub fn content_model<S: AsRef<str>>(
        &self,
        movie_list: &[S],
        top_n: usize,
    ) -> Result<Recommendation, RecommendError> {
        self.recommend(Algorithm::Content, movie_list, top_n)
    }

    /// Up to `top_n` movies liked by people who liked the favorites
    pub fn collab_model<S: AsRef<str>>(
        &self,
        movie_list: &[S],
        top_n: usize,
    ) -> Result<Recommendation, RecommendError> {
        self.recommend(Algorithm::Collaborative, movie_list, top_n)
    }

    /// Main entry point: recommend with the given engine
    #[instrument(skip(self, movie_list), fields(favorites = movie_list.len()))]
    pub fn recommend<S: AsRef<str>>(
        &self,
        algorithm: Algorithm,
        movie_list: &[S],
        top_n: usize,
    ) -> Result<Recommendation, RecommendError> {
        let start_time = Instant::now();

        let profile = self.validate_and_resolve(movie_list, top_n)?;
        debug!(favorites = ?profile.favorites, "Resolved favorites");

        let filtered = match algorithm {
            Algorithm::Content => self.filtered_content_candidates(&profile, top_n)?,
            Algorithm::Collaborative => {
                let candidates = self.collaborative.get_candidates(&profile);
                debug!("Generated {} candidates", candidates.len());
                self.filter_pipeline.apply(candidates, &profile)?
            }
        };
        debug!("Filtering complete, {} candidates remain", filtered.len());

        let recommendation = self.select(algorithm, filtered, top_n);
        if let Some(shortfall) = &recommendation.shortfall {
            debug!(%shortfall, "Returning a short recommendation list");
        }

        debug!(
            "Recommended {} titles in {:.2?}",
            recommendation.len(),
            start_time.elapsed()
        );
        Ok(recommendation)
    }

    /// The `limit` titles most similar to one movie, by content
    pub fn similar_titles(&self, title: &str, limit: usize) -> Result<Vec<(MovieId, f32)>, RecommendError> {
        let movie_id = self
            .catalog
            .resolve_titles(&[title])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("title resolution returned no movie"))?;

        Ok(self
            .content
            .similar_to(movie_id, limit)
            .into_iter()
            .map(|c| (c.movie_id, c.score))
            .collect())
    }

    /// Check the request shape, then map titles onto movies
    fn validate_and_resolve<S: AsRef<str>>(
        &self,
        movie_list: &[S],
        top_n: usize,
    ) -> Result<TasteProfile, RecommendError> {
        if movie_list.len() != FAVORITE_COUNT {
            return Err(InvalidInput::FavoriteCount {
                expected: FAVORITE_COUNT,
                found: movie_list.len(),
            }
            .into());
        }

        let max = self.max_top_n();
        if top_n == 0 || top_n > max {
            return Err(InvalidInput::TopN {
                requested: top_n,
                max,
            }
            .into());
        }

        let profile = build_taste_profile(&self.catalog, movie_list)?;
        if profile.distinct_favorites() != FAVORITE_COUNT {
            let movie_id = profile
                .favorites
                .iter()
                .enumerate()
                .find(|&(i, id)| profile.favorites[..i].contains(id))
                .map(|(_, &id)| id)
                .unwrap_or_default();
            return Err(InvalidInput::DuplicateFavorites { movie_id }.into());
        }
        Ok(profile)
    }

    /// Content candidates that survived the filters.
    ///
    /// The content pool only holds each favorite's nearest neighbors, so when
    /// the filters leave fewer than `top_n` the neighbor count doubles until
    /// enough survive or every movie is in the pool.
    fn filtered_content_candidates(
        &self,
        profile: &TasteProfile,
        top_n: usize,
    ) -> Result<Vec<Candidate>, RecommendError> {
        let mut k = self.content.neighbor_count(top_n);
        loop {
            let candidates = self.content.candidates_with_neighbors(profile, k);
            debug!(neighbors_per_favorite = k, "Generated {} candidates", candidates.len());

            let filtered = self.filter_pipeline.apply(candidates, profile)?;
            if filtered.len() >= top_n || k >= self.catalog.len() {
                return Ok(filtered);
            }
            k = k.saturating_mul(2).min(self.catalog.len());
        }
    }

    /// Take the first `top_n` ranked candidates as titles
    fn select(&self, algorithm: Algorithm, mut candidates: Vec<Candidate>, top_n: usize) -> Recommendation {
        candidates.truncate(top_n);

        let (movie_ids, titles): (Vec<MovieId>, Vec<String>) = candidates
            .iter()
            .filter_map(|c| Some((c.movie_id, self.catalog.title(c.movie_id)?.to_string())))
            .unzip();

        let shortfall = (titles.len() < top_n).then_some(EmptyCandidateWarning {
            requested: top_n,
            available: titles.len(),
        });

        Recommendation {
            titles,
            movie_ids,
            algorithm,
            shortfall,
        }
    }
}
