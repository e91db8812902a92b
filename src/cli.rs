//! Command-line interface definitions.
//!
//! Every option can also be supplied through an environment variable.

use crate::config::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_WAIT_SECS, DEFAULT_TIMEOUT_SECS};
use crate::outputs::OutputFormat;
use clap::Parser;

/// Crawl news feeds and keep articles whose title and body match keywords.
///
/// # Examples
///
/// ```sh
/// feed_sieve --title-words drug,opioid --body-words fentanyl
///
/// # Custom registry, JSON output
/// feed_sieve -t drug -b fentanyl --sources sources.yaml --format json -o ./out
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Keywords matched against entry titles and descriptions (comma-separated)
    #[arg(short, long, env = "FEED_SIEVE_TITLE_WORDS", value_delimiter = ',')]
    pub title_words: Vec<String>,

    /// Keywords matched against the article body (comma-separated)
    #[arg(short, long, env = "FEED_SIEVE_BODY_WORDS", value_delimiter = ',')]
    pub body_words: Vec<String>,

    /// Maximum concurrent fetches per stage [default: CPU count]
    #[arg(long, env = "FEED_SIEVE_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, env = "FEED_SIEVE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Seconds to wait for rendered listing elements to appear
    #[arg(long, env = "FEED_SIEVE_PAGE_WAIT_SECS", default_value_t = DEFAULT_PAGE_WAIT_SECS)]
    pub page_wait_secs: u64,

    /// Upper bound on listing pages visited per rendered source
    #[arg(long, env = "FEED_SIEVE_MAX_PAGES", default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: usize,

    /// Optional path to a sources.yaml registry
    #[arg(short, long, env = "FEED_SIEVE_SOURCES")]
    pub sources: Option<String>,

    /// Directory the results file is written to
    #[arg(short, long, env = "FEED_SIEVE_OUTPUT_DIR", default_value = "output")]
    pub output_dir: String,

    /// Results file format
    #[arg(short, long, env = "FEED_SIEVE_FORMAT", value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
}
