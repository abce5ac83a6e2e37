//! Parser for the CSV data files.
//!
//! This module handles the three tables:
//! - movies.csv: movieId,title,genres
//! - ratings.csv: userId,movieId,rating,timestamp
//! - imdb_data.csv: movieId,title_cast,director,runtime,budget,plot_keywords
//!
//! Titles may contain commas, so rows go through the `csv` reader and are
//! deserialized into serde records before being turned into domain types.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct MovieRecord {
    #[serde(rename = "movieId")]
    movie_id: MovieId,
    title: String,
    genres: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RatingRecord {
    #[serde(rename = "userId")]
    user_id: UserId,
    #[serde(rename = "movieId")]
    movie_id: MovieId,
    rating: f32,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct ImdbRecord {
    #[serde(rename = "movieId")]
    movie_id: MovieId,
    title_cast: Option<String>,
    director: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    runtime: Option<f32>,
    budget: Option<String>,
    plot_keywords: Option<String>,
}

/// Open a data file, mapping a missing file to `FileNotFound`
fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader)
}

fn csv_error(file: &str, err: csv::Error) -> DataLoadError {
    let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
    DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: err.to_string(),
    }
}

/// Parse the movies.csv file
pub fn parse_movies(path: &Path) -> Result<Vec<Movie>> {
    read_movies(open(path)?, "movies.csv")
}

/// Parse movie rows from any reader
///
/// The title often includes year in parentheses: "Toy Story (1995)"
/// Genres are pipe-separated: "Adventure|Animation|Children"
pub fn read_movies<R: Read>(reader: R, file: &str) -> Result<Vec<Movie>> {
    let mut rdr = csv_reader(reader);
    let mut movies = Vec::new();

    for row in rdr.deserialize::<MovieRecord>() {
        let record = row.map_err(|e| csv_error(file, e))?;
        let title = record.title.trim().to_string();

        movies.push(Movie {
            id: record.movie_id,
            year: extract_year_from_title(&title),
            genres: parse_genres(record.genres.as_deref().unwrap_or("")),
            title,
        });
    }
    Ok(movies)
}

/// Parse the ratings.csv file
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    read_ratings(open(path)?, "ratings.csv")
}

/// Parse rating rows from any reader
///
/// Values are not range-checked here; the rating matrix builder decides
/// what to keep.
pub fn read_ratings<R: Read>(reader: R, file: &str) -> Result<Vec<Rating>> {
    let mut rdr = csv_reader(reader);
    let mut ratings = Vec::new();

    for row in rdr.deserialize::<RatingRecord>() {
        let record = row.map_err(|e| csv_error(file, e))?;
        ratings.push(Rating {
            user_id: record.user_id,
            movie_id: record.movie_id,
            rating: record.rating,
            timestamp: record.timestamp,
        });
    }
    Ok(ratings)
}

/// Parse the imdb_data.csv file
pub fn parse_metadata(path: &Path) -> Result<Vec<ImdbMetadata>> {
    read_metadata(open(path)?, "imdb_data.csv")
}

/// Parse IMDb metadata rows from any reader
pub fn read_metadata<R: Read>(reader: R, file: &str) -> Result<Vec<ImdbMetadata>> {
    let mut rdr = csv_reader(reader);
    let mut metadata = Vec::new();

    for row in rdr.deserialize::<ImdbRecord>() {
        let record = row.map_err(|e| csv_error(file, e))?;
        metadata.push(ImdbMetadata {
            movie_id: record.movie_id,
            budget: normalize_budget(record.budget.as_deref()),
            director: record
                .director
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            cast: split_pipe_list(record.title_cast.as_deref().unwrap_or("")),
            plot_keywords: split_pipe_list(record.plot_keywords.as_deref().unwrap_or("")),
            runtime: record.runtime.filter(|r| r.is_finite() && *r > 0.0),
        });
    }
    Ok(metadata)
}

/// Normalize a raw budget cell to a non-negative integer
///
/// Commas are removed, then the first run of digits is taken, so currency
/// markers in front ("$", "GBP ") and decimals behind are ignored.
///
/// Example: "$1,000,000" -> 1000000
///          "GBP 5,000,000" -> 5000000
///          "" or "unknown" -> 0
pub fn normalize_budget(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };
    let cleaned: String = raw.chars().filter(|&c| c != ',').collect();
    let digits: String = cleaned
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().unwrap_or(0)
}

/// Extract year from movie title
///
/// The year is the last `(dddd)` group, wherever it sits.
///
/// Example: "Toy Story (1995)" -> Some(1995)
///          "Blade Runner (1982) (Final Cut)" -> Some(1982)
///          "Movie Title" -> None
pub fn extract_year_from_title(title: &str) -> Option<u16> {
    let bytes = title.as_bytes();
    (0..bytes.len().saturating_sub(5)).rev().find_map(|start| {
        let group = &bytes[start..start + 6];
        let is_year = group[0] == b'('
            && group[5] == b')'
            && group[1..5].iter().all(u8::is_ascii_digit);
        if is_year {
            title[start + 1..start + 5].parse::<u16>().ok()
        } else {
            None
        }
    })
}

/// Parse pipe-separated genres
///
/// Example: "Action|Adventure|Sci-Fi" -> ["Action", "Adventure", "Sci-Fi"]
///          "(no genres listed)" -> []
pub fn parse_genres(s: &str) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for tag in s.split('|').map(str::trim) {
        if tag.is_empty() || tag == NO_GENRES_LISTED {
            continue;
        }
        if !genres.iter().any(|g| g == tag) {
            genres.push(tag.to_string());
        }
    }
    genres
}

/// Split a pipe-separated free-text list, dropping empty items
fn split_pipe_list(s: &str) -> Vec<String> {
    s.split('|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year_from_title("Toy Story (1995)"), Some(1995));
        assert_eq!(extract_year_from_title("Babylon 5 (1994) "), Some(1994));
        assert_eq!(extract_year_from_title("Movie Title"), None);
        assert_eq!(extract_year_from_title("Cosmos (TV)"), None);
        assert_eq!(extract_year_from_title("Blade Runner (1982) (Final Cut)"), Some(1982));
        assert_eq!(extract_year_from_title("Remake (1999) (2004)"), Some(2004));
        assert_eq!(extract_year_from_title("(1995)"), Some(1995));
        assert_eq!(extract_year_from_title("Short (12345)"), None);
    }

    #[test]
    fn test_parse_genres() {
        assert_eq!(
            parse_genres("Action|Adventure|Sci-Fi"),
            vec!["Action", "Adventure", "Sci-Fi"]
        );
        assert!(parse_genres("(no genres listed)").is_empty());
        assert!(parse_genres("").is_empty());
        assert_eq!(parse_genres("Drama|Drama"), vec!["Drama"]);
    }

    #[test]
    fn test_normalize_budget() {
        assert_eq!(normalize_budget(Some("$1,000,000")), 1_000_000);
        assert_eq!(normalize_budget(Some("GBP 5,000,000")), 5_000_000);
        assert_eq!(normalize_budget(Some("$1,500.75")), 1500);
        assert_eq!(normalize_budget(Some("unknown")), 0);
        assert_eq!(normalize_budget(Some("")), 0);
        assert_eq!(normalize_budget(None), 0);
        assert_eq!(normalize_budget(Some("$99999999999999999999999")), 0);
    }

    #[test]
    fn test_read_movies_with_quoted_titles() {
        let data = "movieId,title,genres\n\
                    1,Toy Story (1995),Adventure|Animation|Children|Comedy|Fantasy\n\
                    11,\"American President, The (1995)\",Comedy|Drama|Romance\n\
                    99,Untitled,(no genres listed)\n";

        let movies = read_movies(data.as_bytes(), "movies.csv").unwrap();

        assert_eq!(movies.len(), 3);
        assert_eq!(movies[1].title, "American President, The (1995)");
        assert_eq!(movies[1].year, Some(1995));
        assert_eq!(movies[0].genres.len(), 5);
        assert!(movies[2].genres.is_empty());
        assert_eq!(movies[2].year, None);
    }

    #[test]
    fn test_read_ratings_reports_line() {
        let data = "userId,movieId,rating,timestamp\n\
                    1,1,4.0,964982703\n\
                    1,oops,4.0,964982703\n";

        let err = read_ratings(data.as_bytes(), "ratings.csv").unwrap_err();
        match err {
            DataLoadError::ParseError { file, line, .. } => {
                assert_eq!(file, "ratings.csv");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_metadata_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "movieId,title_cast,director,runtime,budget,plot_keywords").unwrap();
        writeln!(
            file,
            "1,Tom Hanks|Tim Allen,John Lasseter,81.0,\"$30,000,000\",toy|rivalry|cowboy"
        )
        .unwrap();
        writeln!(file, "2,,,,,").unwrap();

        let metadata = parse_metadata(file.path()).unwrap();

        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0].budget, 30_000_000);
        assert_eq!(metadata[0].cast, vec!["Tom Hanks", "Tim Allen"]);
        assert_eq!(metadata[0].director.as_deref(), Some("John Lasseter"));
        assert_eq!(metadata[0].runtime, Some(81.0));
        assert_eq!(metadata[0].plot_keywords.len(), 3);
        assert_eq!(metadata[1].budget, 0);
        assert!(metadata[1].director.is_none());
        assert!(metadata[1].runtime.is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = parse_movies(Path::new("does/not/exist/movies.csv")).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }
}
