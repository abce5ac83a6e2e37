//! Recommender configuration.
//!
//! Every field has a default, so a config file only needs the settings it
//! changes:
//!
//! ```json
//! {
//!   "content": { "weighting": "onehot" },
//!   "collaborative": { "model": "neighborhood", "cache_path": "cache/als.json" },
//!   "min_rating_count": 5
//! }
//! ```

use crate::error::ConfigError;
use engines::{CollaborativeConfig, ContentConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Settings for both engines and the filter pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub content: ContentConfig,
    pub collaborative: CollaborativeConfig,
    /// Minimum ratings a movie needs to be recommended; 0 disables the check
    pub min_rating_count: u32,
}

impl RecommenderConfig {
    pub fn with_content(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }

    pub fn with_collaborative(mut self, collaborative: CollaborativeConfig) -> Self {
        self.collaborative = collaborative;
        self
    }

    pub fn with_min_rating_count(mut self, min: u32) -> Self {
        self.min_rating_count = min;
        self
    }

    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}
