//! The Catalog Store.
//!
//! An immutable in-memory view of movie identities, titles, genre tags and
//! auxiliary metadata. Both recommendation engines depend on it.
//!
//! Lookups:
//! - movieId -> movie, title, genres, metadata
//! - title -> movieId, with explicit "not found" / "ambiguous" outcomes
//! - an ordered, paginated listing of selectable titles

use crate::error::{ResolutionError, UnresolutionReason, UnresolvedTitle};
use crate::types::*;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Read-only catalog of movies.
///
/// Movies are stored in a BTreeMap so every iteration over the catalog runs
/// in ascending movieId order.
#[derive(Debug, Default)]
pub struct Catalog {
    movies: BTreeMap<MovieId, Movie>,
    metadata: HashMap<MovieId, ImdbMetadata>,
    /// Exact (trimmed) title -> ascending movie ids
    title_index: HashMap<String, Vec<MovieId>>,
    /// Genre tag -> ascending movie ids
    genre_index: BTreeMap<String, Vec<MovieId>>,
    /// Uniquely resolvable titles in presentation order
    title_options: Vec<String>,
}

impl Catalog {
    /// Build the catalog from parsed movies and metadata.
    ///
    /// A repeated movieId keeps the first row. Metadata rows for unknown
    /// movies are ignored.
    pub fn new(movies: Vec<Movie>, metadata: Vec<ImdbMetadata>) -> Self {
        let mut by_id: BTreeMap<MovieId, Movie> = BTreeMap::new();
        let mut duplicate_ids = 0usize;
        for movie in movies {
            if by_id.contains_key(&movie.id) {
                duplicate_ids += 1;
                continue;
            }
            by_id.insert(movie.id, movie);
        }
        if duplicate_ids > 0 {
            warn!(duplicate_ids, "Catalog contained repeated movieIds; kept first occurrence");
        }

        let mut metadata_by_id = HashMap::with_capacity(metadata.len());
        let mut orphaned = 0usize;
        for entry in metadata {
            if by_id.contains_key(&entry.movie_id) {
                metadata_by_id.entry(entry.movie_id).or_insert(entry);
            } else {
                orphaned += 1;
            }
        }
        if orphaned > 0 {
            warn!(orphaned, "Ignored metadata rows for movies not in the catalog");
        }

        let mut catalog = Self {
            movies: by_id,
            metadata: metadata_by_id,
            ..Self::default()
        };
        catalog.build_indices();
        catalog
    }

    /// Build title, genre and listing indices after the movies are in place
    fn build_indices(&mut self) {
        for (&movie_id, movie) in &self.movies {
            // BTreeMap iteration is ascending, so every id list stays sorted
            self.title_index
                .entry(movie.title.trim().to_string())
                .or_default()
                .push(movie_id);

            for genre in &movie.genres {
                self.genre_index
                    .entry(genre.clone())
                    .or_default()
                    .push(movie_id);
            }
        }

        let mut options: Vec<String> = self
            .title_index
            .iter()
            .filter(|(_, ids)| ids.len() == 1)
            .map(|(title, _)| title.clone())
            .collect();
        options.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
        self.title_options = options;
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn contains(&self, id: MovieId) -> bool {
        self.movies.contains_key(&id)
    }

    /// Get a movie by ID
    pub fn get_movie(&self, id: MovieId) -> Option<&Movie> {
        self.movies.get(&id)
    }

    /// Title of a movie
    pub fn title(&self, id: MovieId) -> Option<&str> {
        self.movies.get(&id).map(|m| m.title.as_str())
    }

    /// Genre tags of a movie; empty for unknown ids
    pub fn genres(&self, id: MovieId) -> &[String] {
        self.movies
            .get(&id)
            .map(|m| m.genres.as_slice())
            .unwrap_or(&[])
    }

    pub fn metadata(&self, id: MovieId) -> Option<&ImdbMetadata> {
        self.metadata.get(&id)
    }

    /// Normalized budget, 0 when the movie has no metadata
    pub fn budget(&self, id: MovieId) -> u64 {
        self.metadata.get(&id).map(|m| m.budget).unwrap_or(0)
    }

    /// All movie ids, ascending
    pub fn movie_ids(&self) -> impl Iterator<Item = MovieId> + '_ {
        self.movies.keys().copied()
    }

    /// All movies, ascending by id
    pub fn movies(&self) -> impl Iterator<Item = &Movie> + '_ {
        self.movies.values()
    }

    /// Every movie id carrying this exact title (ascending)
    pub fn ids_for_title(&self, title: &str) -> &[MovieId] {
        self.title_index
            .get(title.trim())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a title to its single movie id.
    pub fn resolve_title(&self, title: &str) -> std::result::Result<MovieId, UnresolvedTitle> {
        match self.ids_for_title(title) {
            [id] => Ok(*id),
            [] => Err(UnresolvedTitle {
                title: title.to_string(),
                reason: UnresolutionReason::NotFound,
            }),
            ids => Err(UnresolvedTitle {
                title: title.to_string(),
                reason: UnresolutionReason::Ambiguous(ids.to_vec()),
            }),
        }
    }

    /// Resolve every title, reporting all failures together.
    pub fn resolve_titles<S: AsRef<str>>(
        &self,
        titles: &[S],
    ) -> std::result::Result<Vec<MovieId>, ResolutionError> {
        let mut ids = Vec::with_capacity(titles.len());
        let mut failures = Vec::new();
        for title in titles {
            match self.resolve_title(title.as_ref()) {
                Ok(id) => ids.push(id),
                Err(failure) => failures.push(failure),
            }
        }
        if failures.is_empty() {
            Ok(ids)
        } else {
            Err(ResolutionError { failures })
        }
    }

    /// Selectable titles: every uniquely resolvable title once,
    /// sorted case-insensitively.
    pub fn title_options(&self) -> &[String] {
        &self.title_options
    }

    /// One zero-based page of `title_options`; empty past the end
    pub fn title_page(&self, page: usize, per_page: usize) -> &[String] {
        if per_page == 0 {
            return &[];
        }
        let start = page.saturating_mul(per_page);
        if start >= self.title_options.len() {
            return &[];
        }
        let end = (start + per_page).min(self.title_options.len());
        &self.title_options[start..end]
    }

    /// Case-insensitive title search: exact matches first, then substring
    /// matches, each group by ascending id.
    pub fn search(&self, query: &str) -> Vec<&Movie> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let mut exact = Vec::new();
        let mut partial = Vec::new();
        for movie in self.movies.values() {
            let title = movie.title.to_lowercase();
            if title == query {
                exact.push(movie);
            } else if title.contains(&query) {
                partial.push(movie);
            }
        }
        exact.extend(partial);
        exact
    }

    /// Genre tags observed in the catalog, sorted
    pub fn genre_vocabulary(&self) -> impl Iterator<Item = &str> + '_ {
        self.genre_index.keys().map(|g| g.as_str())
    }

    /// Get all movies in a specific genre
    pub fn movies_by_genre(&self, genre: &str) -> &[MovieId] {
        self.genre_index
            .get(genre)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: MovieId, title: &str, genres: &[&str]) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            year: crate::parser::extract_year_from_title(title),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn create_test_catalog() -> Catalog {
        Catalog::new(
            vec![
                movie(1, "Toy Story (1995)", &["Animation", "Children"]),
                movie(2, "Jumanji (1995)", &["Adventure", "Children"]),
                movie(3, "Heat (1995)", &["Action", "Crime"]),
                movie(4, "Hamlet (2000)", &["Drama"]),
                movie(5, "Hamlet (2000)", &["Drama"]),
                movie(6, "apollo 13 (1995)", &["Drama"]),
                // repeated id is ignored
                movie(1, "Not Toy Story", &["Horror"]),
            ],
            vec![ImdbMetadata {
                movie_id: 3,
                budget: 60_000_000,
                ..ImdbMetadata::default()
            }],
        )
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = create_test_catalog();

        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.title(1), Some("Toy Story (1995)"));
        assert_eq!(catalog.genres(2), ["Adventure", "Children"]);
        assert!(catalog.genres(999).is_empty());
        assert_eq!(catalog.budget(3), 60_000_000);
        assert_eq!(catalog.budget(1), 0);
    }

    #[test]
    fn test_resolve_title() {
        let catalog = create_test_catalog();

        assert_eq!(catalog.resolve_title("Heat (1995)"), Ok(3));
        assert_eq!(catalog.resolve_title("  Heat (1995) "), Ok(3));

        let missing = catalog
            .resolve_title("Definitely Not A Real Movie (1900)")
            .unwrap_err();
        assert_eq!(missing.reason, UnresolutionReason::NotFound);

        let ambiguous = catalog.resolve_title("Hamlet (2000)").unwrap_err();
        assert_eq!(ambiguous.reason, UnresolutionReason::Ambiguous(vec![4, 5]));
    }

    #[test]
    fn test_resolve_titles_collects_all_failures() {
        let catalog = create_test_catalog();

        let err = catalog
            .resolve_titles(&["Toy Story (1995)", "Nope", "Hamlet (2000)"])
            .unwrap_err();

        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.not_found().collect::<Vec<_>>(), vec!["Nope"]);
        let ambiguous: Vec<_> = err.ambiguous().collect();
        assert_eq!(ambiguous, vec![("Hamlet (2000)", &[4, 5][..])]);

        let ok = catalog
            .resolve_titles(&["Heat (1995)", "Toy Story (1995)"])
            .unwrap();
        assert_eq!(ok, vec![3, 1]);
    }

    #[test]
    fn test_title_options_order_and_uniqueness() {
        let catalog = create_test_catalog();

        // Ambiguous "Hamlet (2000)" is not selectable
        assert_eq!(
            catalog.title_options(),
            [
                "apollo 13 (1995)",
                "Heat (1995)",
                "Jumanji (1995)",
                "Toy Story (1995)"
            ]
        );
        assert_eq!(catalog.title_page(0, 3).len(), 3);
        assert_eq!(catalog.title_page(1, 3), ["Toy Story (1995)"]);
        assert!(catalog.title_page(2, 3).is_empty());
        assert!(catalog.title_page(0, 0).is_empty());
    }

    #[test]
    fn test_search() {
        let catalog = create_test_catalog();

        let hits: Vec<MovieId> = catalog.search("heat (1995)").iter().map(|m| m.id).collect();
        assert_eq!(hits, vec![3]);

        let hits: Vec<MovieId> = catalog.search("1995").iter().map(|m| m.id).collect();
        assert_eq!(hits, vec![1, 2, 3, 6]);
        assert!(catalog.search("   ").is_empty());
    }

    #[test]
    fn test_genre_index() {
        let catalog = create_test_catalog();

        assert_eq!(catalog.movies_by_genre("Children"), [1, 2]);
        assert_eq!(catalog.movies_by_genre("Drama"), [4, 5, 6]);
        assert!(catalog.movies_by_genre("Horror").is_empty());
        let vocabulary: Vec<&str> = catalog.genre_vocabulary().collect();
        assert_eq!(
            vocabulary,
            vec!["Action", "Adventure", "Animation", "Children", "Crime", "Drama"]
        );
    }
}
