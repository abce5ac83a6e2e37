//! Loading the three tables from a data directory.
//!
//! The directory is expected to hold:
//! - movies.csv (required)
//! - ratings.csv (required)
//! - imdb_data.csv (optional; without it every budget is 0 and no text
//!   features are available)

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

pub const MOVIES_FILE: &str = "movies.csv";
pub const RATINGS_FILE: &str = "ratings.csv";
pub const METADATA_FILE: &str = "imdb_data.csv";

impl Dataset {
    /// Load the dataset from a directory
    ///
    /// The three files are parsed in parallel with nested `rayon::join`s.
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        info!(dir = %data_dir.display(), "Loading dataset");
        let start = Instant::now();

        let movies_path = data_dir.join(MOVIES_FILE);
        let ratings_path = data_dir.join(RATINGS_FILE);
        let metadata_path = data_dir.join(METADATA_FILE);

        let ((movies, metadata), ratings) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_movies(&movies_path),
                    || parser::parse_metadata(&metadata_path),
                )
            },
            || parser::parse_ratings(&ratings_path),
        );

        let movies = movies?;
        let ratings = ratings?;
        let metadata = match metadata {
            Ok(metadata) => metadata,
            Err(DataLoadError::FileNotFound { path }) => {
                warn!(%path, "No metadata file; continuing without budgets and text features");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        info!(
            movies = movies.len(),
            ratings = ratings.len(),
            metadata = metadata.len(),
            elapsed = ?start.elapsed(),
            "Dataset loaded"
        );
        Ok(Dataset::new(movies, ratings, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_required_files(dir: &Path) {
        fs::write(
            dir.join(MOVIES_FILE),
            "movieId,title,genres\n1,Toy Story (1995),Animation|Children\n2,Heat (1995),Action\n",
        )
        .unwrap();
        fs::write(
            dir.join(RATINGS_FILE),
            "userId,movieId,rating,timestamp\n1,1,4.0,964982703\n1,2,3.5,964982704\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_without_metadata() {
        let dir = tempdir().unwrap();
        write_required_files(dir.path());

        let dataset = Dataset::load_from_dir(dir.path()).unwrap();

        assert_eq!(dataset.counts(), (2, 2, 0));
    }

    #[test]
    fn test_load_with_metadata() {
        let dir = tempdir().unwrap();
        write_required_files(dir.path());
        fs::write(
            dir.path().join(METADATA_FILE),
            "movieId,title_cast,director,runtime,budget,plot_keywords\n2,Al Pacino,Michael Mann,170,\"$60,000,000\",heist\n",
        )
        .unwrap();

        let dataset = Dataset::load_from_dir(dir.path()).unwrap();

        assert_eq!(dataset.metadata.len(), 1);
        assert_eq!(dataset.metadata[0].budget, 60_000_000);
    }

    #[test]
    fn test_missing_ratings_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MOVIES_FILE), "movieId,title,genres\n").unwrap();

        let err = Dataset::load_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }
}
