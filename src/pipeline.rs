//! The crawl pipeline.
//!
//! For one source: list entries, prune by title words, fetch surviving
//! bodies concurrently, prune by body words, dedupe by link. Across sources
//! the per-source lists are simply concatenated; global dedup belongs to
//! the aggregator in [`crate::outputs`].

use crate::config::CrawlConfig;
use crate::filter::{body_matches, title_matches, visible_text};
use crate::models::{Article, CrawlResult, Entry};
use crate::sources::FeedSource;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Run every stage of the crawl for one source.
///
/// Entries are listed, pruned by title words, fetched concurrently (at most
/// `config.max_concurrency` in flight), pruned by body words and deduplicated
/// by link. A failed body fetch only removes that one entry.
///
/// # Arguments
///
/// * `source` - The strategy that lists entries and fetches bodies
/// * `config` - Keywords and concurrency bounds for this crawl
///
/// # Returns
///
/// The results for this source, unique by link, in no particular order.
/// A source that lists nothing, or has no title words configured, yields
/// an empty list rather than an error.
#[instrument(level = "info", skip_all, fields(source = %source.name()))]
pub async fn run_source<S: FeedSource>(source: &S, config: &CrawlConfig) -> Vec<CrawlResult> {
    if config.title_words.is_empty() {
        info!("No title words configured; skipping source");
        return Vec::new();
    }

    let entries = source.list_entries(config).await;
    let listed = entries.len();

    let candidates: Vec<Entry> = entries
        .into_iter()
        .filter(|entry| title_matches(entry, &config.title_words))
        .unique_by(|entry| entry.link.clone())
        .collect();
    info!(listed, survivors = candidates.len(), "Title stage complete");

    if candidates.is_empty() {
        return Vec::new();
    }

    let articles: Vec<Option<Article>> = stream::iter(candidates)
        .map(|entry| async move {
            match source.fetch_body(&entry.link, config).await {
                Ok(body) => Some(Article { entry, body }),
                Err(e) => {
                    debug!(link = %entry.link, error = %e, "Body fetch failed; skipping entry");
                    None
                }
            }
        })
        .buffer_unordered(config.max_concurrency.max(1))
        .collect()
        .await;

    let fetched = articles.iter().filter(|a| a.is_some()).count();

    let mut seen_links: HashSet<String> = HashSet::new();
    let mut results = Vec::new();
    for article in articles.into_iter().flatten() {
        let text = visible_text(&String::from_utf8_lossy(&article.body));
        if !body_matches(&text, &config.body_words) {
            continue;
        }
        if !seen_links.insert(article.entry.link.clone()) {
            continue;
        }
        results.push(CrawlResult::new(
            source.result_title(&article),
            article.entry.link.clone(),
        ));
    }

    info!(fetched, results = results.len(), "Body stage complete");
    results
}

/// Run all sources concurrently and concatenate their results.
///
/// Order across sources is whatever order they finish in.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn run_all<S: FeedSource>(sources: &[S], config: &CrawlConfig) -> Vec<CrawlResult> {
    let per_source: Vec<Vec<CrawlResult>> = stream::iter(sources)
        .map(|source| run_source(source, config))
        .buffer_unordered(sources.len().max(1))
        .collect()
        .await;

    let results: Vec<CrawlResult> = per_source.into_iter().flatten().collect();
    info!(count = results.len(), "All sources complete");
    results
}
