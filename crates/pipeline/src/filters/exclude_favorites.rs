//! Filter to remove the favorites themselves.
//!
//! This is the first filter in the pipeline: recommending one of the three
//! movies the user just named is never useful.

use crate::traits::Filter;
use anyhow::Result;
use data_loader::Catalog;
use engines::{Candidate, TasteProfile};
use std::sync::Arc;

/// Removes candidates that are a favorite or share a favorite's title.
///
/// ## Algorithm
/// Uses the HashSets in TasteProfile for O(1) lookups, first by id, then by
/// title so a re-release listed under the same title is dropped too.
pub struct ExcludeFavoritesFilter {
    catalog: Arc<Catalog>,
}

impl ExcludeFavoritesFilter {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

impl Filter for ExcludeFavoritesFilter {
    fn name(&self) -> &str {
        "ExcludeFavoritesFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, profile: &TasteProfile) -> Result<Vec<Candidate>> {
        let filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| !profile.is_favorite(candidate.movie_id))
            .filter(|candidate| {
                self.catalog
                    .title(candidate.movie_id)
                    .is_none_or(|title| !profile.excluded_titles.contains(title))
            })
            .collect();
        Ok(filtered)
    }
}
