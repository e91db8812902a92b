//! Crawl settings and the source registry.
//!
//! [`CrawlConfig`] is immutable for the duration of one crawl and is passed
//! by reference into every component. The source registry is either read
//! from a YAML file or taken from [`default_sources`].
//!
//! # Registry format
//!
//! ```yaml
//! - name: cbc
//!   kind: static
//!   base_url: https://www.cbc.ca
//!   path: /rss/
//! - name: rcmp
//!   kind: rendered
//!   base_url: https://rcmp.ca
//!   path: /en/news
//!   listing:
//!     description_selector: td.nws-tbl-desc
//!     link_selector: a.h4
//!     pagination_selector: .paginate_button
//!     title_selector: h1
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PAGE_WAIT_SECS: u64 = 10;
pub const DEFAULT_MAX_PAGES: usize = 50;

/// Settings for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Lower-cased. Empty means every source is skipped.
    pub title_words: Vec<String>,
    /// Lower-cased.
    pub body_words: Vec<String>,
    /// Upper bound on in-flight fetches per fan-out stage.
    pub max_concurrency: usize,
    pub request_timeout: Duration,
    /// How long the rendered strategy waits for DOM elements to attach.
    pub page_wait: Duration,
    /// Hard cap on the number of listing pages visited.
    pub max_pages: usize,
}

impl CrawlConfig {
    pub fn new(title_words: &[String], body_words: &[String]) -> Self {
        Self {
            title_words: normalize_words(title_words),
            body_words: normalize_words(body_words),
            max_concurrency: default_concurrency(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_wait: Duration::from_secs(DEFAULT_PAGE_WAIT_SECS),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_page_wait(mut self, wait: Duration) -> Self {
        self.page_wait = wait;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}

/// Trim, lower-case and drop empty keywords.
pub fn normalize_words(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Available CPU parallelism, or 1 if it cannot be determined.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Which strategy enumerates a source's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Plain HTTP: discover feeds on a landing page and parse them.
    Static,
    /// Headless browser: paginate a script-rendered listing.
    Rendered,
}

/// CSS selectors describing a rendered listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Cells holding each row's description text.
    pub description_selector: String,
    /// Anchors paired positionally with the description cells.
    pub link_selector: String,
    /// Pagination controls; the last one is "next".
    pub pagination_selector: String,
    /// Heading on an article page used as the result title.
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
}

fn default_title_selector() -> String {
    "h1".to_string()
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            description_selector: "td.nws-tbl-desc".to_string(),
            link_selector: "a.h4".to_string(),
            pagination_selector: ".paginate_button".to_string(),
            title_selector: "h1.mrgn-tp-md".to_string(),
        }
    }
}

/// One entry of the source registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,
    #[serde(default)]
    pub path: String,
    /// Only consulted for [`SourceKind::Rendered`].
    #[serde(default)]
    pub listing: Option<ListingSelectors>,
}

impl SourceConfig {
    pub fn new(name: &str, kind: SourceKind, base_url: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base_url: base_url.to_string(),
            path: path.to_string(),
            listing: None,
        }
    }

    /// Parsed base URL.
    pub fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidUrl {
            name: self.name.clone(),
            url: self.base_url.clone(),
            source,
        })
    }

    /// `base_url` joined with `path`.
    pub fn entry_url(&self) -> Result<Url, ConfigError> {
        let base = self.base()?;
        if self.path.is_empty() {
            return Ok(base);
        }
        base.join(&self.path).map_err(|source| ConfigError::InvalidUrl {
            name: self.name.clone(),
            url: format!("{}{}", self.base_url, self.path),
            source,
        })
    }
}

/// The built-in registry: four Canadian news sites with plain feeds and the
/// RCMP press-release index, which needs a browser.
pub fn default_sources() -> Vec<SourceConfig> {
    let mut rcmp = SourceConfig::new("rcmp", SourceKind::Rendered, "https://rcmp.ca", "/en/news");
    rcmp.listing = Some(ListingSelectors::default());

    vec![
        SourceConfig::new("canada.ca", SourceKind::Static, "https://www.canada.ca", "/en/news/web-feeds.html"),
        SourceConfig::new("cbc", SourceKind::Static, "https://www.cbc.ca", "/rss/"),
        SourceConfig::new("globalnews", SourceKind::Static, "https://globalnews.ca", "/pages/feeds/"),
        SourceConfig::new("thestar", SourceKind::Static, "https://www.thestar.com", "/site/static-pages/rss-feeds.html"),
        rcmp,
    ]
}

/// Parse a YAML source registry and validate every base URL.
pub fn parse_sources(yaml: &str) -> Result<Vec<SourceConfig>, ConfigError> {
    let sources: Vec<SourceConfig> = serde_yaml::from_str(yaml)?;
    if sources.is_empty() {
        return Err(ConfigError::Empty);
    }
    for source in &sources {
        source.entry_url()?;
    }
    Ok(sources)
}

/// Load the registry from `path`, or fall back to [`default_sources`].
#[instrument(level = "info")]
pub async fn load_sources(path: Option<&str>) -> Result<Vec<SourceConfig>, ConfigError> {
    let Some(path) = path else {
        let sources = default_sources();
        info!(count = sources.len(), "Using built-in source registry");
        return Ok(sources);
    };

    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
    let sources = parse_sources(&yaml)?;
    info!(count = sources.len(), %path, "Loaded source registry");
    Ok(sources)
}
