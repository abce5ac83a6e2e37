//! Filter to keep one candidate per title.
//!
//! The catalog may list the same title under several movieIds. Showing the
//! same title twice wastes a slot, so only the best-ranked one survives.

use crate::traits::Filter;
use anyhow::Result;
use data_loader::Catalog;
use engines::{Candidate, TasteProfile};
use std::collections::HashSet;
use std::sync::Arc;

/// Keeps the first occurrence of every title, in ranked order.
///
/// Candidates unknown to the catalog are dropped: they could never be
/// rendered as a title.
pub struct DistinctTitleFilter {
    catalog: Arc<Catalog>,
}

impl DistinctTitleFilter {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

impl Filter for DistinctTitleFilter {
    fn name(&self) -> &str {
        "DistinctTitleFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, _profile: &TasteProfile) -> Result<Vec<Candidate>> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(candidates.len());
        let filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| match self.catalog.title(candidate.movie_id) {
                Some(title) => seen.insert(title.trim()),
                None => false,
            })
            .collect();
        Ok(filtered)
    }
}
