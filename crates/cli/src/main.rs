use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{Catalog, Dataset, DatasetInsights, MovieId, RatingMatrix, UnresolutionReason};
use engines::ModelKind;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use recommender::{Algorithm, RecommendError, Recommendation, Recommender, RecommenderConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::debug;

/// movie-recs - three favorites in, N recommendations out
#[derive(Parser)]
#[command(name = "movie-recs")]
#[command(about = "Content-based and collaborative movie recommendations from three favorites", long_about = None)]
struct Cli {
    /// Directory holding movies.csv, ratings.csv and (optionally) imdb_data.csv
    #[arg(short, long, default_value = "resources/data")]
    data_dir: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Collaborative model: factorization or neighborhood
    #[arg(long)]
    model: Option<ModelKind>,

    /// Latent factors for the factorization model
    #[arg(long)]
    factors: Option<usize>,

    /// ALS iterations for the factorization model
    #[arg(long)]
    iterations: Option<usize>,

    /// Cache file for the trained factorization model
    #[arg(long)]
    model_cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend movies for three favorite titles
    Recommend {
        /// content or collab
        #[arg(short, long, default_value = "content")]
        algorithm: Algorithm,

        /// Favorite title, exactly as listed (give three)
        #[arg(short, long = "movie", required = true)]
        movies: Vec<String>,

        /// Number of recommendations to return
        #[arg(short = 'n', long, default_value = "10")]
        top_n: usize,
    },

    /// List selectable titles
    Titles {
        /// Zero-based page
        #[arg(long, default_value = "0")]
        page: usize,

        #[arg(long, default_value = "20")]
        per_page: usize,
    },

    /// Search for movies by title
    Search {
        /// Movie title to search for (case-insensitive substring match)
        #[arg(long)]
        title: String,
    },

    /// Show the movies most similar to one title
    Similar {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Summarize the dataset
    Insights {
        /// Number of most-rated movies to list
        #[arg(long, default_value = "10")]
        top: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,

        /// Seed for picking random favorites
        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(short, long, default_value = "content")]
        algorithm: Algorithm,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    debug!(?config, "Effective configuration");

    // Load the dataset (this may take a moment)
    println!("Loading dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let data_dir = cli.data_dir.clone();
    let dataset = tokio::task::spawn_blocking(move || Dataset::load_from_dir(&data_dir))
        .await?
        .context("Failed to load dataset")?;
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            algorithm,
            movies,
            top_n,
        } => {
            let recommender = build_recommender(dataset, config).await?;
            handle_recommend(&recommender, algorithm, &movies, top_n)?
        }
        Commands::Titles { page, per_page } => handle_titles(dataset, page, per_page)?,
        Commands::Search { title } => handle_search(dataset, &title)?,
        Commands::Similar { title, limit } => {
            let recommender = build_recommender(dataset, config).await?;
            handle_similar(&recommender, &title, limit)?
        }
        Commands::Insights { top, json } => handle_insights(dataset, top, json)?,
        Commands::Benchmark {
            requests,
            concurrent,
            seed,
            algorithm,
        } => {
            let recommender = Arc::new(build_recommender(dataset, config).await?);
            handle_benchmark(recommender, algorithm, requests, concurrent, seed).await?
        }
    }

    Ok(())
}

/// Config file first, then command-line overrides on top
fn load_config(cli: &Cli) -> Result<RecommenderConfig> {
    let mut config = match &cli.config {
        Some(path) => RecommenderConfig::from_json_file(path)?,
        None => RecommenderConfig::default(),
    };

    if let Some(model) = cli.model {
        config.collaborative.model = model;
    }
    if let Some(factors) = cli.factors {
        config.collaborative.factorization.factors = factors;
    }
    if let Some(iterations) = cli.iterations {
        config.collaborative.factorization.iterations = iterations;
    }
    if let Some(path) = &cli.model_cache {
        config.collaborative.cache_path = Some(path.clone());
    }
    Ok(config)
}

async fn build_recommender(dataset: Dataset, config: RecommenderConfig) -> Result<Recommender> {
    let start = Instant::now();
    let recommender = tokio::task::spawn_blocking(move || Recommender::build(dataset, config))
        .await?
        .context("Failed to build recommender")?;
    println!(
        "{} Built engines in {:?} (collaborative model: {})",
        "✓".green(),
        start.elapsed(),
        recommender.collaborative_model_name()
    );
    Ok(recommender)
}

/// Handle the 'recommend' command
fn handle_recommend(
    recommender: &Recommender,
    algorithm: Algorithm,
    movies: &[String],
    top_n: usize,
) -> Result<()> {
    match recommender.recommend(algorithm, movies, top_n) {
        Ok(recommendation) => {
            print_recommendations(recommender, &recommendation);
            Ok(())
        }
        Err(RecommendError::Resolution(err)) => {
            println!("{}", "Some favorites could not be found:".bold().red());
            for failure in &err.failures {
                match &failure.reason {
                    UnresolutionReason::NotFound => {
                        println!("  {} {:?} is not in the catalog", "✗".red(), failure.title);
                        for suggestion in recommender.catalog().search(&failure.title).iter().take(3) {
                            println!("      did you mean {:?}?", suggestion.title);
                        }
                    }
                    UnresolutionReason::Ambiguous(ids) => println!(
                        "  {} {:?} names {} different movies (ids {:?}) and cannot be used",
                        "✗".red(),
                        failure.title,
                        ids.len(),
                        ids
                    ),
                }
            }
            bail!("{}", err)
        }
        Err(RecommendError::InvalidInput(err)) => {
            println!("{} {}", "Invalid request:".bold().red(), err);
            Err(err.into())
        }
        Err(err) => Err(err).context("Recommendation failed"),
    }
}

/// Handle the 'titles' command
fn handle_titles(dataset: Dataset, page: usize, per_page: usize) -> Result<()> {
    let catalog = Catalog::new(dataset.movies, dataset.metadata);
    let total = catalog.title_options().len();
    let titles = catalog.title_page(page, per_page);

    println!(
        "{}",
        format!("Titles (page {}, {} selectable in total):", page, total).bold().blue()
    );
    if titles.is_empty() {
        println!("  (no titles on this page)");
    }
    for (offset, title) in titles.iter().enumerate() {
        println!("{:>6}. {}", page * per_page + offset + 1, title);
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(dataset: Dataset, title: &str) -> Result<()> {
    let catalog = Catalog::new(dataset.movies, dataset.metadata);
    let matrix = RatingMatrix::build(&dataset.ratings, &catalog);
    let matches = catalog.search(title);

    println!("{}", format!("Search results for '{}':", title).bold().blue());
    if matches.is_empty() {
        println!("  no matches");
    }
    // Display top 20 results with movie ID, title, genres, and rating stats
    for movie in matches.iter().take(20) {
        let stats = matrix.stats_or_unrated(movie.id);
        let ambiguous = catalog.ids_for_title(&movie.title).len() > 1;
        println!(
            "{}: {} [{}] avg {:.2} ({} ratings){}",
            movie.id,
            movie.title,
            movie.genres.join(", "),
            stats.avg_rating,
            stats.rating_count,
            if ambiguous { " (ambiguous title)".yellow().to_string() } else { String::new() }
        );
    }
    Ok(())
}

/// Handle the 'similar' command
fn handle_similar(recommender: &Recommender, title: &str, limit: usize) -> Result<()> {
    let similar = recommender
        .similar_titles(title, limit)
        .with_context(|| format!("Cannot look up {:?}", title))?;

    println!("{}", format!("Movies similar to {}:", title).bold().blue());
    for (rank, (movie_id, score)) in similar.iter().enumerate() {
        println!(
            "{}. {} [{}] - similarity {:.3}",
            (rank + 1).to_string().green(),
            display_title(recommender.catalog(), *movie_id),
            recommender.catalog().genres(*movie_id).join(", "),
            score
        );
    }
    Ok(())
}

/// Handle the 'insights' command
fn handle_insights(dataset: Dataset, top: usize, json: bool) -> Result<()> {
    let catalog = Catalog::new(dataset.movies, dataset.metadata);
    let matrix = RatingMatrix::build(&dataset.ratings, &catalog);
    let insights = DatasetInsights::compute(&catalog, &matrix, &dataset.ratings, top);

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    println!("{}", "Dataset".bold().blue());
    println!("{}Movies: {}", "• ".green(), catalog.len());
    println!("{}Users: {}", "• ".green(), matrix.user_count());
    println!("{}Ratings: {} (mean {:.2})", "• ".green(), matrix.nnz(), matrix.global_mean());

    println!("{}", "Rating distribution".bold().blue());
    for (bucket, count) in &insights.rating_distribution {
        println!("  {:>3.1}: {}", *bucket as f32 / 2.0, count);
    }

    println!("{}", "Ratings per year".bold().blue());
    for (year, count) in &insights.ratings_per_year {
        println!("  {}: {}", year, count);
    }

    println!("{}", "Movies per genre".bold().blue());
    for (genre, count) in &insights.genre_counts {
        println!("  {}: {}", genre, count);
    }

    println!("{}", "Releases per year".bold().blue());
    for (year, count) in &insights.movies_per_release_year {
        println!("  {}: {}", year, count);
    }
    println!("  undated: {}", insights.undated_movies);

    println!("{}", format!("Top {} most rated", top).bold().blue());
    for (rank, movie) in insights.most_rated.iter().enumerate() {
        println!(
            "{}. {} - {} ratings, avg {:.2}",
            (rank + 1).to_string().green(),
            movie.title,
            movie.rating_count,
            movie.avg_rating
        );
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    recommender: Arc<Recommender>,
    algorithm: Algorithm,
    requests: usize,
    concurrent: usize,
    seed: u64,
) -> Result<()> {
    if requests == 0 {
        bail!("--requests must be at least 1");
    }
    let options = recommender.catalog().title_options();
    if options.len() < recommender::FAVORITE_COUNT {
        bail!("Need at least {} selectable titles to benchmark", recommender::FAVORITE_COUNT);
    }
    let top_n = 10.min(recommender.max_top_n()).max(1);

    // Seeded favorites so runs are comparable
    let mut rng = StdRng::seed_from_u64(seed);
    let favorite_sets: Vec<Vec<String>> = (0..requests)
        .map(|_| {
            options
                .choose_multiple(&mut rng, recommender::FAVORITE_COUNT)
                .cloned()
                .collect()
        })
        .collect();

    // Use tokio::spawn to make concurrent requests, bounded by a semaphore
    let semaphore = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall_clock = Instant::now();
    let mut handles = vec![];
    for favorites in favorite_sets {
        let recommender = recommender.clone();
        let semaphore = semaphore.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let elapsed = tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                recommender.recommend(algorithm, &favorites, top_n)?;
                Ok::<_, anyhow::Error>(start.elapsed())
            })
            .await??;
            Ok::<Duration, anyhow::Error>(elapsed)
        });
        handles.push(handle);
    }

    // Wait for all tasks to complete and collect timings
    let mut timings: Vec<Duration> = vec![];
    for handle in handles {
        let elapsed = handle.await??;
        timings.push(elapsed);
    }
    let total_time = wall_clock.elapsed();

    let busy_time: Duration = timings.iter().sum();
    let avg_latency = busy_time / (timings.len() as u32);
    timings.sort();
    let percentile = |p: f32| {
        let index = ((timings.len() as f32 * p) as usize).min(timings.len() - 1);
        timings[index]
    };
    let throughput = requests as f32 / total_time.as_secs_f32();

    println!("{}", format!("Benchmark results ({}):", algorithm).bold().blue());
    println!("Requests: {} ({} concurrent)", requests, concurrent);
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

fn display_title(catalog: &Catalog, movie_id: MovieId) -> String {
    catalog
        .title(movie_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("<unknown movie {}>", movie_id))
}

/// Helper function to format and print recommendations
fn print_recommendations(recommender: &Recommender, recommendation: &Recommendation) {
    println!(
        "{}",
        format!("Movie Recommendations ({}):", recommendation.algorithm).bold().blue()
    );
    for (rank, (title, &movie_id)) in recommendation
        .titles
        .iter()
        .zip(&recommendation.movie_ids)
        .enumerate()
    {
        let stats = recommender.ratings().stats_or_unrated(movie_id);
        println!(
            "{}. {} [{}] - avg {:.2} ({} ratings)",
            (rank + 1).to_string().green(),
            title,
            recommender.catalog().genres(movie_id).join(", "),
            stats.avg_rating,
            stats.rating_count
        );
    }
    if let Some(shortfall) = &recommendation.shortfall {
        println!("{} {}", "!".yellow(), shortfall.to_string().yellow());
    }
    if recommendation.is_empty() {
        println!("{}", "No recommendations available".yellow());
    }
}
