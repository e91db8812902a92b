//! Sources whose feeds are plain RSS/Atom documents over HTTP.
//!
//! Listing a static source is a two-hop crawl: fetch the landing page,
//! discover the feed links on it, then fetch and parse every feed
//! concurrently. Any single hop failing only removes that hop's
//! contribution.

use crate::config::CrawlConfig;
use crate::discovery::discover_feed_links;
use crate::error::FetchError;
use crate::feed::parse_feed;
use crate::fetch::HttpFetcher;
use crate::models::Entry;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// A landing page listing syndication feeds.
#[derive(Debug, Clone)]
pub struct StaticFeedSource {
    name: String,
    landing_url: Url,
    fetcher: HttpFetcher,
}

impl StaticFeedSource {
    /// `fetcher` should already be bound to the source's base URL.
    pub fn new(name: impl Into<String>, landing_url: Url, fetcher: HttpFetcher) -> Self {
        Self {
            name: name.into(),
            landing_url,
            fetcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every entry of every feed discovered on the landing page.
    #[instrument(level = "info", skip_all, fields(source = %self.name))]
    pub async fn list_entries(&self, config: &CrawlConfig) -> Vec<Entry> {
        let landing = match self.fetcher.fetch(self.landing_url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Landing page unavailable; source contributes nothing");
                return Vec::new();
            }
        };

        let html = String::from_utf8_lossy(&landing);
        let feed_urls = discover_feed_links(&html, self.landing_url.as_str());
        if feed_urls.is_empty() {
            warn!(url = %self.landing_url, "No feed links discovered");
            return Vec::new();
        }
        info!(count = feed_urls.len(), "Discovered feeds");

        let fetcher = &self.fetcher;
        let payloads: Vec<(String, Result<Vec<u8>, FetchError>)> = stream::iter(feed_urls)
            .map(|feed_url| async move {
                let payload = fetcher.fetch(&feed_url).await;
                (feed_url, payload)
            })
            .buffer_unordered(config.max_concurrency)
            .collect()
            .await;

        let mut entries = Vec::new();
        for (feed_url, payload) in payloads {
            let payload = match payload {
                Ok(payload) => payload,
                Err(e) => {
                    debug!(%feed_url, error = %e, "Feed fetch failed; skipping");
                    continue;
                }
            };
            match parse_feed(&payload) {
                Ok(parsed) => {
                    debug!(%feed_url, format = parsed.format.name(), count = parsed.entries.len(), "Parsed feed");
                    entries.extend(
                        parsed
                            .entries
                            .into_iter()
                            .map(|entry| resolve_link(entry, &feed_url)),
                    );
                }
                Err(e) => debug!(
                    %feed_url,
                    error = %e,
                    preview = %truncate_for_log(&String::from_utf8_lossy(&payload), 200),
                    "Unusable feed payload; skipping"
                ),
            }
        }

        info!(count = entries.len(), "Listed feed entries");
        entries
    }

    pub async fn fetch_body(&self, link: &str) -> Result<Vec<u8>, FetchError> {
        self.fetcher.fetch(link).await
    }
}

/// Make a relative entry link absolute against the feed it came from.
fn resolve_link(mut entry: Entry, feed_url: &str) -> Entry {
    if let Err(url::ParseError::RelativeUrlWithoutBase) = Url::parse(&entry.link) {
        if let Ok(resolved) = Url::parse(feed_url).and_then(|base| base.join(&entry.link)) {
            entry.link = resolved.to_string();
        }
    }
    entry
}
