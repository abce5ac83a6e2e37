//! Core traits for the filtering pipeline.
//!
//! This module defines the Filter trait that allows composable,
//! extensible filters to be applied to ranked candidate lists.

use anyhow::Result;
use engines::{Candidate, TasteProfile};

/// Core trait for filtering candidates.
///
/// All filters must implement this trait to be used in the FilterPipeline.
///
/// ## Design Note
/// - `Send + Sync` allows filters to be shared by concurrent requests
/// - Filters take ownership of the Vec<Candidate> and return a filtered Vec
/// - Candidates arrive ranked; a filter may drop entries but never reorder them
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a ranked list of candidates.
    ///
    /// # Arguments
    /// * `candidates` - The candidates to filter (takes ownership)
    /// * `profile` - The favorites the list was built for
    ///
    /// # Returns
    /// * `Ok(Vec<Candidate>)` - The surviving candidates, in input order
    /// * `Err` - If filtering fails
    fn apply(&self, candidates: Vec<Candidate>, profile: &TasteProfile) -> Result<Vec<Candidate>>;
}
