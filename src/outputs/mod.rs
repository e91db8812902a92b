//! Aggregation and output writing.
//!
//! The aggregator merges per-source result lists into one set keyed by
//! link; the first result seen for a link wins. The merged list is then
//! written exactly once, after every source has finished.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── news_articles_2025-05-06.csv
//! └── news_articles_2025-05-06.json
//! ```

pub mod csv;
pub mod json;

use crate::models::CrawlResult;
use chrono::NaiveDate;
use clap::ValueEnum;
use itertools::Itertools;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Serialization used for the results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Globally dedupe by link, keeping the first occurrence.
pub fn merge(results: Vec<CrawlResult>) -> Vec<CrawlResult> {
    results
        .into_iter()
        .unique_by(|result| result.link.clone())
        .collect()
}

/// `news_articles_<date>.<ext>` inside `output_dir`.
pub fn output_path(output_dir: &str, date: NaiveDate, format: OutputFormat) -> PathBuf {
    Path::new(output_dir).join(format!(
        "news_articles_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    ))
}

/// Write the merged results to a dated file.
///
/// # Arguments
///
/// * `results` - Deduplicated results from every source
/// * `output_dir` - Existing, writable directory for the file
/// * `date` - Date used in the file name
/// * `format` - CSV or JSON
///
/// # Returns
///
/// The path written, `{output_dir}/news_articles_{date}.{ext}`.
///
/// # Errors
///
/// Fails if serialization fails or the file cannot be written.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir, ?format, count = results.len()))]
pub async fn write_results(
    results: &[CrawlResult],
    output_dir: &str,
    date: NaiveDate,
    format: OutputFormat,
) -> Result<PathBuf, Box<dyn Error>> {
    let body = match format {
        OutputFormat::Csv => csv::to_csv(results),
        OutputFormat::Json => json::to_json(results)?,
    };

    let path = output_path(output_dir, date, format);
    info!(path = %path.display(), "Writing results");
    tokio::fs::write(&path, body).await?;
    info!(path = %path.display(), "Wrote results file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    #[test]
    fn test_merge_keeps_first_seen_title() {
        let merged = merge(vec![
            CrawlResult::new("From cbc", "https://n.example/1"),
            CrawlResult::new("Other", "https://n.example/2"),
            CrawlResult::new("From globalnews", "https://n.example/1"),
        ]);
        assert_eq!(
            merged,
            vec![
                CrawlResult::new("From cbc", "https://n.example/1"),
                CrawlResult::new("Other", "https://n.example/2"),
            ]
        );
    }

    #[test]
    fn test_output_path_is_dated() {
        let path = output_path("out", date(), OutputFormat::Csv);
        assert_eq!(path, PathBuf::from("out/news_articles_2025-05-06.csv"));
        let path = output_path("out", date(), OutputFormat::Json);
        assert_eq!(path, PathBuf::from("out/news_articles_2025-05-06.json"));
    }

    #[tokio::test]
    async fn test_write_results_csv() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let results = vec![CrawlResult::new("Drug bust, downtown", "https://n.example/1")];

        let path = write_results(&results, out, date(), OutputFormat::Csv)
            .await
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "index,Title,Link\r\n0,\"Drug bust, downtown\",https://n.example/1\r\n");
    }

    #[tokio::test]
    async fn test_write_results_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let results = vec![CrawlResult::new("Drug bust", "https://n.example/1")];

        let path = write_results(&results, out, date(), OutputFormat::Json)
            .await
            .unwrap();
        let parsed: Vec<CrawlResult> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, results);
    }

    #[tokio::test]
    async fn test_write_results_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let results = vec![CrawlResult::new("t", "https://n.example/1")];

        let outcome = write_results(&results, missing.to_str().unwrap(), date(), OutputFormat::Csv).await;
        assert!(outcome.is_err());
    }
}
