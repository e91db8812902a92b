//! Feed source strategies.
//!
//! A source knows how to enumerate its [`Entry`] records and how to fetch
//! the body behind an entry's link. The pipeline is generic over
//! [`FeedSource`] and does everything else.
//!
//! | Strategy | Module | Listing | Body fetch |
//! |----------|--------|---------|------------|
//! | Static | [`static_feed`] | landing page → discovered RSS/Atom feeds | plain HTTP GET |
//! | Rendered | [`rendered`] | headless browser, paginated table | headless browser, one tab per link |

pub mod rendered;
pub mod static_feed;

use crate::config::{CrawlConfig, SourceConfig, SourceKind};
use crate::error::{ConfigError, FetchError};
use crate::fetch::HttpFetcher;
use crate::models::{Article, Entry};
use rendered::RenderedFeedSource;
use static_feed::StaticFeedSource;

/// One configured feed source.
#[allow(async_fn_in_trait)]
pub trait FeedSource {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Enumerate candidate entries. Failures degrade to an empty list.
    async fn list_entries(&self, config: &CrawlConfig) -> Vec<Entry>;

    /// Fetch the body behind `link`.
    async fn fetch_body(&self, link: &str, config: &CrawlConfig) -> Result<Vec<u8>, FetchError>;

    /// Title reported for an article that passed both filters.
    fn result_title(&self, article: &Article) -> String {
        article.entry.title.clone()
    }
}

/// A source built from the registry.
#[derive(Debug)]
pub enum Source {
    Static(StaticFeedSource),
    Rendered(RenderedFeedSource),
}

impl Source {
    /// Build the strategy named by `config.kind`. `http` supplies the
    /// shared client; each static source gets its own base URL binding.
    pub fn from_config(config: &SourceConfig, http: &HttpFetcher) -> Result<Self, ConfigError> {
        let base = config.base()?;
        let entry_url = config.entry_url()?;
        Ok(match config.kind {
            SourceKind::Static => Source::Static(StaticFeedSource::new(
                config.name.clone(),
                entry_url,
                http.with_base(base),
            )),
            SourceKind::Rendered => Source::Rendered(RenderedFeedSource::new(
                config.name.clone(),
                entry_url,
                config.listing.clone().unwrap_or_default(),
            )),
        })
    }
}

impl FeedSource for Source {
    fn name(&self) -> &str {
        match self {
            Source::Static(s) => s.name(),
            Source::Rendered(s) => s.name(),
        }
    }

    async fn list_entries(&self, config: &CrawlConfig) -> Vec<Entry> {
        match self {
            Source::Static(s) => s.list_entries(config).await,
            Source::Rendered(s) => s.list_entries(config).await,
        }
    }

    async fn fetch_body(&self, link: &str, config: &CrawlConfig) -> Result<Vec<u8>, FetchError> {
        match self {
            Source::Static(s) => s.fetch_body(link).await,
            Source::Rendered(s) => s.fetch_body(link, config).await,
        }
    }

    fn result_title(&self, article: &Article) -> String {
        match self {
            Source::Static(_) => article.entry.title.clone(),
            Source::Rendered(s) => s.result_title(article),
        }
    }
}
