//! # Engines Crate
//!
//! The two recommendation engines behind the orchestrator.
//!
//! ## Components
//!
//! ### Content Similarity Engine
//! Item similarity over descriptive metadata:
//! - "Movies that look like your favorites"
//! - Genre tokens (plus optional director/cast/keyword tokens), TF-IDF or
//!   one-hot, cosine similarity
//!
//! ### Collaborative Rating Engine
//! Prediction from rating patterns:
//! - "Movies loved by people who loved your favorites"
//! - ALS latent factors or a user neighborhood, behind [`AffinityModel`]
//! - Popularity fallback for cold start
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Catalog, Dataset, RatingMatrix};
//! use engines::{build_taste_profile, CollaborativeConfig, CollaborativeEngine, ContentConfig, ContentEngine};
//! use std::sync::Arc;
//!
//! let dataset = Dataset::load_from_dir("resources/data".as_ref())?;
//! let catalog = Arc::new(Catalog::new(dataset.movies, dataset.metadata));
//! let ratings = Arc::new(RatingMatrix::build(&dataset.ratings, &catalog));
//!
//! let profile = build_taste_profile(&catalog, &["Toy Story (1995)", "Jumanji (1995)", "Heat (1995)"])?;
//!
//! let content = ContentEngine::build(catalog.clone(), ratings.clone(), ContentConfig::default())?;
//! let collab = CollaborativeEngine::build(catalog.clone(), ratings.clone(), &CollaborativeConfig::default())?;
//!
//! let by_content = content.get_candidates(&profile, 10);
//! let by_ratings = collab.get_candidates(&profile);
//! ```
//!
//! Both engines are immutable after construction and `Send + Sync`, so one
//! instance serves any number of concurrent queries.

pub mod collaborative;
pub mod content;
pub mod error;
pub mod profile;
pub mod types;

// Re-export commonly used types
pub use collaborative::factorization::{FactorModel, FactorizationConfig};
pub use collaborative::neighborhood::{NeighborhoodConfig, NeighborhoodModel};
pub use collaborative::{
    AffinityModel, AffinityProfile, CollaborativeConfig, CollaborativeEngine, ModelKind,
};
pub use content::{ContentConfig, ContentEngine, FeatureWeighting, SimilarityMatrix};
pub use error::{ModelCacheError, ModelConstructionError};
pub use profile::{build_taste_profile, TasteProfile};
pub use types::{rank, top_k, Candidate, CandidateSource};
