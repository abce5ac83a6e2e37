//! Build a TasteProfile from the favorite titles.
//!
//! The profile is the only "user" the engines ever see: three resolved
//! favorites plus the sets used to keep them out of the results.

use data_loader::{Catalog, MovieId, ResolutionError};
use std::collections::HashSet;

/// A hypothetical user defined by their favorite movies.
#[derive(Debug, Clone, Default)]
pub struct TasteProfile {
    /// Favorites in the order they were given
    pub favorites: Vec<MovieId>,
    /// Ids that must never be recommended
    pub excluded: HashSet<MovieId>,
    /// Titles that must never be recommended
    pub excluded_titles: HashSet<String>,
}

impl TasteProfile {
    /// Profile over already-resolved favorites
    pub fn new(catalog: &Catalog, favorites: Vec<MovieId>) -> Self {
        let excluded: HashSet<MovieId> = favorites.iter().copied().collect();
        let excluded_titles = favorites
            .iter()
            .filter_map(|&id| catalog.title(id))
            .map(str::to_string)
            .collect();
        Self {
            favorites,
            excluded,
            excluded_titles,
        }
    }

    pub fn is_favorite(&self, movie_id: MovieId) -> bool {
        self.excluded.contains(&movie_id)
    }

    /// Number of distinct favorites
    pub fn distinct_favorites(&self) -> usize {
        self.excluded.len()
    }
}

/// Build a TasteProfile by resolving favorite titles in the catalog
///
/// Every title must map onto exactly one movie; otherwise the error lists
/// each title that failed and why.
pub fn build_taste_profile<S: AsRef<str>>(
    catalog: &Catalog,
    titles: &[S],
) -> Result<TasteProfile, ResolutionError> {
    let favorites = catalog.resolve_titles(titles)?;
    Ok(TasteProfile::new(catalog, favorites))
}
