//! Integration tests for the pipeline.
//!
//! These tests verify that the filters work together on engine output in a
//! realistic scenario.

use data_loader::{Catalog, Movie, Rating, RatingMatrix};
use engines::{build_taste_profile, Candidate, CandidateSource, ContentConfig, ContentEngine};
use pipeline::filters::*;
use pipeline::FilterPipeline;
use std::sync::Arc;

fn create_test_setup() -> (Arc<Catalog>, Arc<RatingMatrix>) {
    let movies = vec![
        (1, "Toy Story (1995)", "Adventure|Animation|Children|Comedy|Fantasy"),
        (2, "Jumanji (1995)", "Adventure|Children|Fantasy"),
        (3, "Heat (1995)", "Action|Crime|Thriller"),
        (4, "Toy Story 2 (1999)", "Adventure|Animation|Children|Comedy|Fantasy"),
        (5, "Hamlet (1996)", "Drama"),
        (6, "Hamlet (1996)", "Drama|Romance"),
        (7, "Heat (1995)", "Action|Crime|Thriller"),
        (8, "Balto (1995)", "Adventure|Animation|Children"),
    ]
    .into_iter()
    .map(|(id, title, genres)| Movie {
        id,
        title: title.to_string(),
        year: Some(1995),
        genres: data_loader::parser::parse_genres(genres),
    })
    .collect();
    let catalog = Catalog::new(movies, Vec::new());

    // Toy Story 2 is popular, Balto barely rated
    let mut ratings = Vec::new();
    for user_id in 0..30 {
        ratings.push(Rating {
            user_id,
            movie_id: 4,
            rating: 4.5,
            timestamp: 1000000,
        });
    }
    ratings.push(Rating {
        user_id: 99,
        movie_id: 8,
        rating: 4.0,
        timestamp: 1000000,
    });
    let matrix = RatingMatrix::build(&ratings, &catalog);

    (Arc::new(catalog), Arc::new(matrix))
}

fn standard_pipeline(catalog: &Arc<Catalog>, ratings: &Arc<RatingMatrix>, min_count: u32) -> FilterPipeline {
    FilterPipeline::new()
        .add_filter(ExcludeFavoritesFilter::new(catalog.clone()))
        .add_filter(DistinctTitleFilter::new(catalog.clone()))
        .add_filter(MinimumRatingCountFilter::new(ratings.clone(), min_count))
}

#[test]
fn test_full_pipeline_filters_correctly() {
    let (catalog, ratings) = create_test_setup();
    // "Heat (1995)" is ambiguous, so favorites are given by id here
    let profile = engines::TasteProfile::new(&catalog, vec![1, 2, 3]);

    let candidates = vec![
        Candidate::new(1, CandidateSource::Content, 0.99), // favorite
        Candidate::new(4, CandidateSource::Content, 0.95),
        Candidate::new(5, CandidateSource::Content, 0.80),
        Candidate::new(6, CandidateSource::Content, 0.70), // second "Hamlet"
        Candidate::new(7, CandidateSource::Content, 0.60), // same title as favorite 3
        Candidate::new(8, CandidateSource::Content, 0.50),
    ];

    let filtered = standard_pipeline(&catalog, &ratings, 0)
        .apply(candidates, &profile)
        .unwrap();

    let ids: Vec<u32> = filtered.iter().map(|c| c.movie_id).collect();
    assert_eq!(ids, vec![4, 5, 8]);
}

#[test]
fn test_minimum_rating_count_after_engine() {
    let (catalog, ratings) = create_test_setup();
    let profile = build_taste_profile(&catalog, &["Toy Story (1995)", "Jumanji (1995)"]).unwrap();

    let engine = ContentEngine::build(catalog.clone(), ratings.clone(), ContentConfig::default()).unwrap();
    let candidates = engine.get_candidates(&profile, 5);

    let filtered = standard_pipeline(&catalog, &ratings, 10)
        .apply(candidates, &profile)
        .unwrap();

    // only Toy Story 2 has ten ratings
    let ids: Vec<u32> = filtered.iter().map(|c| c.movie_id).collect();
    assert_eq!(ids, vec![4]);
}

#[test]
fn test_complete_pipeline_realistic() {
    let (catalog, ratings) = create_test_setup();
    let profile = build_taste_profile(&catalog, &["Toy Story (1995)", "Jumanji (1995)"]).unwrap();

    let engine = ContentEngine::build(catalog.clone(), ratings.clone(), ContentConfig::default()).unwrap();
    let candidates = engine.get_candidates(&profile, 5);
    let before: Vec<u32> = candidates.iter().map(|c| c.movie_id).collect();

    let filtered = standard_pipeline(&catalog, &ratings, 0)
        .apply(candidates, &profile)
        .unwrap();

    assert!(!filtered.is_empty());
    assert_eq!(filtered[0].movie_id, 4);

    // filters only drop, never reorder
    let after: Vec<u32> = filtered.iter().map(|c| c.movie_id).collect();
    let mut positions = after.iter().map(|id| before.iter().position(|b| b == id).unwrap());
    let mut last = positions.next().unwrap();
    for position in positions {
        assert!(position > last);
        last = position;
    }

    // no duplicate titles survive
    let mut titles: Vec<&str> = after.iter().filter_map(|&id| catalog.title(id)).collect();
    let total = titles.len();
    titles.sort();
    titles.dedup();
    assert_eq!(titles.len(), total);
}
