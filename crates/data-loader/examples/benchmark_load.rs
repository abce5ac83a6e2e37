use data_loader::{Catalog, Dataset, RatingMatrix};
use std::path::Path;
use std::time::Instant;

fn main() {
    let data_dir = Path::new("resources/data");

    println!("Loading dataset from {}...\n", data_dir.display());

    let start = Instant::now();
    let Dataset { movies, ratings, metadata } =
        Dataset::load_from_dir(data_dir).expect("Failed to load dataset");
    let parsed = start.elapsed();

    let catalog = Catalog::new(movies, metadata);
    let matrix = RatingMatrix::build(&ratings, &catalog);
    let elapsed = start.elapsed();

    println!("\n=== Load Complete ===");
    println!("Parse time: {:?}", parsed);
    println!("Total time: {:?}", elapsed);
    println!("Movies: {}", catalog.len());
    println!("Users: {}", matrix.user_count());
    println!("Ratings kept: {}", matrix.nnz());
    println!("Build report: {:?}", matrix.report());
    println!("\nPerformance: {:.0} ratings/second",
             ratings.len() as f64 / elapsed.as_secs_f64());
}
