//! Latent-factor model trained with alternating least squares.
//!
//! Every user and every rated movie gets a `factors`-dimensional vector whose
//! dot product approximates the mean-centered rating. The three favorites
//! stand in for a user we never saw: their item vectors are averaged into a
//! pseudo-user and candidates are scored against it.
//!
//! ## Algorithm
//! 1. Seed item factors from a fixed `StdRng` seed
//! 2. Fix items, solve one regularized least-squares system per user
//! 3. Fix users, solve one system per movie
//! 4. Repeat for `iterations` rounds
//!
//! Each system is a small symmetric positive definite matrix solved by
//! Cholesky decomposition in f64. Rows are solved in parallel and collected
//! in row order, so training is bit-for-bit repeatable.

use super::{AffinityModel, AffinityProfile};
use crate::error::{ModelCacheError, ModelConstructionError};
use data_loader::{MatrixFingerprint, MovieId, RatingMatrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// ALS hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorizationConfig {
    /// Latent dimensions
    pub factors: usize,
    /// Ridge penalty, scaled by the number of ratings in each row
    pub regularization: f32,
    pub iterations: usize,
    pub seed: u64,
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self {
            factors: 16,
            regularization: 0.1,
            iterations: 12,
            seed: 42,
        }
    }
}

impl FactorizationConfig {
    pub fn with_factors(mut self, factors: usize) -> Self {
        self.factors = factors;
        self
    }

    pub fn with_regularization(mut self, regularization: f32) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<(), ModelConstructionError> {
        if self.factors == 0 {
            return Err(ModelConstructionError::InvalidConfig(
                "factors must be at least 1".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(ModelConstructionError::InvalidConfig(
                "iterations must be at least 1".to_string(),
            ));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(ModelConstructionError::InvalidConfig(format!(
                "regularization must be a non-negative number, got {}",
                self.regularization
            )));
        }
        Ok(())
    }
}

/// Trained item embeddings plus what they were trained on.
///
/// User factors are discarded after training: queries only ever need the
/// item side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorModel {
    config: FactorizationConfig,
    fingerprint: MatrixFingerprint,
    global_mean: f32,
    /// Column order of the matrix the model was trained on
    movie_ids: Vec<MovieId>,
    item_factors: Vec<Vec<f32>>,
    training_rmse: f32,
}

impl FactorModel {
    /// Train on the full rating matrix
    pub fn train(
        matrix: &RatingMatrix,
        config: &FactorizationConfig,
    ) -> Result<Self, ModelConstructionError> {
        config.validate()?;
        if matrix.is_empty() {
            return Err(ModelConstructionError::EmptyRatingMatrix);
        }

        let start = Instant::now();
        let k = config.factors;
        let mean = matrix.global_mean();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let scale = 0.1 / (k as f32).sqrt();
        let mut item_factors: Vec<Vec<f32>> = (0..matrix.movie_count())
            .map(|_| (0..k).map(|_| rng.random::<f32>() * scale).collect())
            .collect();
        let mut user_factors: Vec<Vec<f32>> = Vec::new();

        for iteration in 1..=config.iterations {
            user_factors = solve_side(matrix.rows(), &item_factors, config, mean);
            item_factors = solve_side(matrix.columns(), &user_factors, config, mean);

            let finite = |side: &[Vec<f32>]| side.iter().flatten().all(|v| v.is_finite());
            if !finite(&user_factors) || !finite(&item_factors) {
                return Err(ModelConstructionError::NonFiniteFactors { iteration });
            }
            debug!(iteration, "ALS iteration complete");
        }

        let training_rmse = rmse(matrix, &user_factors, &item_factors, mean);
        info!(
            users = matrix.user_count(),
            movies = matrix.movie_count(),
            factors = k,
            iterations = config.iterations,
            training_rmse,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Factorization model trained"
        );

        Ok(Self {
            config: config.clone(),
            fingerprint: matrix.fingerprint(),
            global_mean: mean,
            movie_ids: matrix.movie_ids().to_vec(),
            item_factors,
            training_rmse,
        })
    }

    /// Reuse a cached model when it still fits, otherwise train (and cache).
    ///
    /// Cache problems are logged and never fail the build.
    pub fn load_or_train(
        matrix: &RatingMatrix,
        config: &FactorizationConfig,
        cache_path: Option<&Path>,
    ) -> Result<Self, ModelConstructionError> {
        if let Some(path) = cache_path.filter(|p| p.exists()) {
            let cached = Self::load(path).and_then(|model| {
                if model.is_compatible(matrix, config) {
                    Ok(model)
                } else {
                    Err(ModelCacheError::Incompatible)
                }
            });
            match cached {
                Ok(model) => {
                    info!(path = %path.display(), "Loaded factorization model from cache");
                    return Ok(model);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring model cache"),
            }
        }

        let model = Self::train(matrix, config)?;
        if let Some(path) = cache_path {
            match model.save(path) {
                Ok(()) => info!(path = %path.display(), "Wrote factorization model cache"),
                Err(e) => warn!(path = %path.display(), error = %e, "Could not write model cache"),
            }
        }
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelCacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelCacheError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Was this model trained on `matrix` with `config`?
    pub fn is_compatible(&self, matrix: &RatingMatrix, config: &FactorizationConfig) -> bool {
        let current = matrix.fingerprint();
        let same_sum = (self.fingerprint.rating_sum - current.rating_sum).abs()
            <= 1e-9 * current.rating_sum.abs().max(1.0);

        self.config == *config
            && self.fingerprint.users == current.users
            && self.fingerprint.movies == current.movies
            && self.fingerprint.ratings == current.ratings
            && same_sum
            && self.movie_ids == matrix.movie_ids()
            && self.item_factors.len() == self.movie_ids.len()
            && self.item_factors.iter().all(|v| v.len() == config.factors)
    }

    pub fn config(&self) -> &FactorizationConfig {
        &self.config
    }

    pub fn training_rmse(&self) -> f32 {
        self.training_rmse
    }

    pub fn global_mean(&self) -> f32 {
        self.global_mean
    }

    /// Embedding of a rated movie
    pub fn item_vector(&self, movie_id: MovieId) -> Option<&[f32]> {
        let col = self.movie_ids.binary_search(&movie_id).ok()?;
        Some(&self.item_factors[col])
    }
}

impl AffinityModel for FactorModel {
    fn name(&self) -> &str {
        "factorization"
    }

    fn profile<'a>(&'a self, favorites: &[MovieId]) -> Box<dyn AffinityProfile + 'a> {
        let vectors: Vec<&[f32]> = favorites
            .iter()
            .filter_map(|&id| self.item_vector(id))
            .collect();

        let pseudo_user = (!vectors.is_empty()).then(|| {
            let mut user = vec![0.0f32; self.config.factors];
            for vector in &vectors {
                for (u, v) in user.iter_mut().zip(vector.iter()) {
                    *u += v;
                }
            }
            let n = vectors.len() as f32;
            user.iter_mut().for_each(|u| *u /= n);
            user
        });

        debug!(
            favorites_with_history = vectors.len(),
            "Built factorization profile"
        );
        Box::new(FactorProfile {
            model: self,
            pseudo_user,
        })
    }
}

/// Pseudo-user built from the favorites' embeddings
struct FactorProfile<'a> {
    model: &'a FactorModel,
    pseudo_user: Option<Vec<f32>>,
}

impl AffinityProfile for FactorProfile<'_> {
    fn predict(&self, candidate: MovieId) -> Option<f32> {
        let user = self.pseudo_user.as_ref()?;
        let item = self.model.item_vector(candidate)?;
        Some(dot(user, item))
    }

    fn is_empty(&self) -> bool {
        self.pseudo_user.is_none()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve every row of one side with the other side held fixed
///
/// `entries[i]` lists (index into `fixed`, rating). Rows without ratings get
/// a zero vector.
fn solve_side(
    entries: &[Vec<(u32, f32)>],
    fixed: &[Vec<f32>],
    config: &FactorizationConfig,
    mean: f32,
) -> Vec<Vec<f32>> {
    let k = config.factors;
    entries
        .par_iter()
        .map(|row| {
            if row.is_empty() {
                return vec![0.0; k];
            }

            let mut gram = vec![0.0f64; k * k];
            let mut rhs = vec![0.0f64; k];
            for &(j, rating) in row {
                let y = &fixed[j as usize];
                let residual = (rating - mean) as f64;
                for p in 0..k {
                    let yp = y[p] as f64;
                    rhs[p] += yp * residual;
                    for q in 0..=p {
                        gram[p * k + q] += yp * y[q] as f64;
                    }
                }
            }

            let ridge = (config.regularization as f64 * row.len() as f64).max(1e-9);
            for p in 0..k {
                gram[p * k + p] += ridge;
                for q in 0..p {
                    gram[q * k + p] = gram[p * k + q];
                }
            }

            match solve_spd(&mut gram, &rhs, k) {
                Some(x) => x.into_iter().map(|v| v as f32).collect(),
                None => vec![f32::NAN; k],
            }
        })
        .collect()
}

/// Solve `a x = b` for symmetric positive definite `a` (row-major, k x k).
///
/// `a` is overwritten with its Cholesky factor. Returns `None` when `a` is
/// not positive definite.
fn solve_spd(a: &mut [f64], b: &[f64], k: usize) -> Option<Vec<f64>> {
    // a = L L^T, L stored in the lower triangle
    for j in 0..k {
        let mut diag = a[j * k + j];
        for p in 0..j {
            diag -= a[j * k + p] * a[j * k + p];
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let l_jj = diag.sqrt();
        a[j * k + j] = l_jj;

        for i in (j + 1)..k {
            let mut value = a[i * k + j];
            for p in 0..j {
                value -= a[i * k + p] * a[j * k + p];
            }
            a[i * k + j] = value / l_jj;
        }
    }

    // L y = b
    let mut y = vec![0.0f64; k];
    for i in 0..k {
        let mut value = b[i];
        for p in 0..i {
            value -= a[i * k + p] * y[p];
        }
        y[i] = value / a[i * k + i];
    }

    // L^T x = y
    let mut x = vec![0.0f64; k];
    for i in (0..k).rev() {
        let mut value = y[i];
        for p in (i + 1)..k {
            value -= a[p * k + i] * x[p];
        }
        x[i] = value / a[i * k + i];
    }
    Some(x)
}

fn rmse(matrix: &RatingMatrix, users: &[Vec<f32>], items: &[Vec<f32>], mean: f32) -> f32 {
    let (sum, count) = matrix
        .rows()
        .par_iter()
        .enumerate()
        .map(|(u, row)| {
            let sum: f64 = row
                .iter()
                .map(|&(j, rating)| {
                    let predicted = mean + dot(&users[u], &items[j as usize]);
                    ((rating - predicted) as f64).powi(2)
                })
                .sum();
            (sum, row.len())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .fold((0.0f64, 0usize), |(s, c), (rs, rc)| (s + rs, c + rc));

    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Catalog, Movie, Rating};
    use tempfile::tempdir;

    /// Users 1-5 love movies 1-4 and dislike 5-7; users 6-10 the reverse.
    fn create_test_matrix() -> RatingMatrix {
        let movies = (1..=8)
            .map(|id| Movie {
                id,
                title: format!("Movie {} (2000)", id),
                year: Some(2000),
                genres: vec!["Drama".to_string()],
            })
            .collect();
        let catalog = Catalog::new(movies, Vec::new());

        let mut ratings = Vec::new();
        for user_id in 1..=10u32 {
            for movie_id in 1..=7u32 {
                let camp_a = user_id <= 5;
                let likes = (movie_id <= 4) == camp_a;
                ratings.push(Rating {
                    user_id,
                    movie_id,
                    rating: if likes { 5.0 } else { 1.0 },
                    timestamp: 0,
                });
            }
        }
        RatingMatrix::build(&ratings, &catalog)
    }

    fn small_config() -> FactorizationConfig {
        FactorizationConfig::default().with_factors(4).with_iterations(8)
    }

    #[test]
    fn test_solve_spd() {
        // [[4, 2], [2, 3]] x = [2, 1] -> x = [0.5, 0]
        let mut a = vec![4.0, 2.0, 2.0, 3.0];
        let x = solve_spd(&mut a, &[2.0, 1.0], 2).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_solve_spd_rejects_indefinite() {
        let mut a = vec![1.0, 2.0, 2.0, 1.0];
        assert!(solve_spd(&mut a, &[1.0, 1.0], 2).is_none());
    }

    #[test]
    fn test_train_learns_camps() {
        let matrix = create_test_matrix();
        let model = FactorModel::train(&matrix, &small_config()).unwrap();
        let profile = model.profile(&[1, 2, 3]);

        assert!(!profile.is_empty());
        let same_camp = profile.predict(4).unwrap();
        let other_camp = profile.predict(5).unwrap();
        assert!(same_camp > other_camp);

        // movie 8 has no ratings, hence no embedding
        assert!(profile.predict(8).is_none());
        assert!(model.training_rmse() < 1.0);
    }

    #[test]
    fn test_training_is_deterministic() {
        let matrix = create_test_matrix();
        let a = FactorModel::train(&matrix, &small_config()).unwrap();
        let b = FactorModel::train(&matrix, &small_config()).unwrap();
        assert_eq!(a.item_vector(1), b.item_vector(1));
        assert_eq!(a.item_vector(7), b.item_vector(7));
    }

    #[test]
    fn test_profile_without_history_is_empty() {
        let matrix = create_test_matrix();
        let model = FactorModel::train(&matrix, &small_config()).unwrap();
        let profile = model.profile(&[8, 999]);
        assert!(profile.is_empty());
        assert!(profile.predict(1).is_none());
    }

    #[test]
    fn test_invalid_config() {
        let matrix = create_test_matrix();
        let err = FactorModel::train(&matrix, &small_config().with_factors(0)).unwrap_err();
        assert!(matches!(err, ModelConstructionError::InvalidConfig(_)));

        let err = FactorModel::train(&matrix, &small_config().with_regularization(f32::NAN))
            .unwrap_err();
        assert!(matches!(err, ModelConstructionError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_matrix() {
        let err = FactorModel::train(&RatingMatrix::default(), &small_config()).unwrap_err();
        assert_eq!(err, ModelConstructionError::EmptyRatingMatrix);
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("als.json");
        let matrix = create_test_matrix();
        let config = small_config();

        let trained = FactorModel::load_or_train(&matrix, &config, Some(&path)).unwrap();
        assert!(path.exists());

        let loaded = FactorModel::load(&path).unwrap();
        assert!(loaded.is_compatible(&matrix, &config));
        for id in 1..=7 {
            let (a, b) = (trained.item_vector(id).unwrap(), loaded.item_vector(id).unwrap());
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).abs() < 1e-6);
            }
        }

        // other settings must not reuse the cache
        assert!(!loaded.is_compatible(&matrix, &config.clone().with_seed(7)));
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("als.json");
        fs::write(&path, "not json").unwrap();

        let matrix = create_test_matrix();
        let model = FactorModel::load_or_train(&matrix, &small_config(), Some(&path)).unwrap();
        assert!(model.item_vector(1).is_some());

        // the retrained model replaced the corrupt file
        assert!(FactorModel::load(&path).is_ok());
    }

    #[test]
    fn test_load_missing_cache() {
        let dir = tempdir().unwrap();
        let err = FactorModel::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ModelCacheError::Io(_)));
    }
}
