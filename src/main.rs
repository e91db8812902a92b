//! # Feed Sieve
//!
//! A keyword-filtering news crawler. It discovers syndication feeds on news
//! landing pages and walks JavaScript-rendered press-release listings in a
//! headless browser. Each entry whose title matches is kept, its article is
//! fetched, and it is kept again only if the article body matches too.
//!
//! ## Usage
//!
//! ```sh
//! feed_sieve --title-words drug,opioid --body-words fentanyl -o ./output
//! ```
//!
//! ## Architecture
//!
//! 1. **Listing**: each source enumerates entries (static feeds or a rendered listing)
//! 2. **Title stage**: entries without a title keyword are dropped
//! 3. **Body stage**: survivors are fetched concurrently and filtered by body keywords
//! 4. **Output**: results from all sources are deduplicated by link and written once

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod discovery;
mod error;
mod feed;
mod fetch;
mod filter;
mod models;
mod outputs;
mod pipeline;
mod sources;
mod utils;

use cli::Cli;
use config::{CrawlConfig, load_sources};
use fetch::HttpFetcher;
use sources::Source;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feed_sieve starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = CrawlConfig::new(&args.title_words, &args.body_words)
        .with_request_timeout(Duration::from_secs(args.timeout_secs))
        .with_page_wait(Duration::from_secs(args.page_wait_secs))
        .with_max_pages(args.max_pages);
    if let Some(n) = args.max_concurrency {
        config = config.with_max_concurrency(n);
    }
    info!(
        title_words = ?config.title_words,
        body_words = ?config.body_words,
        max_concurrency = config.max_concurrency,
        "Crawl configured"
    );
    if config.title_words.is_empty() {
        warn!("No title words given; every source will be skipped");
    }

    // Early check: ensure output dir is writable before spending time crawling
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let registry = load_sources(args.sources.as_deref()).await?;

    let http = HttpFetcher::new(config.request_timeout).map_err(|e| {
        error!(error = %e, "Failed to build HTTP client");
        e
    })?;

    let sources: Vec<Source> = registry
        .iter()
        .filter_map(|source_config| match Source::from_config(source_config, &http) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(source = %source_config.name, error = %e, "Skipping misconfigured source");
                None
            }
        })
        .collect();
    info!(count = sources.len(), "Sources ready");

    // ---- Crawl ----
    let results = pipeline::run_all(&sources, &config).await;
    let results = outputs::merge(results);
    info!(count = results.len(), "Unique results after merge");

    // ---- Output ----
    let date = Local::now().date_naive();
    let path = outputs::write_results(&results, &args.output_dir, date, args.format)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to write results");
            e
        })?;
    info!(path = %path.display(), count = results.len(), "Results written");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
