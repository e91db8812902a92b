//! Feed discovery on a landing page.
//!
//! Anchors whose `href` mentions a syndication marker are taken as feed
//! links and resolved to absolute URLs.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use url::Url;

const FEED_MARKERS: [&str; 3] = ["rss", "atom", "feed"];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// Extract candidate feed URLs from a landing page.
///
/// An anchor is a candidate when its `href` contains `rss`, `atom` or
/// `feed` (case-insensitive). `javascript:` and `mailto:` links are ignored.
///
/// # Arguments
///
/// * `html` - The landing page markup
/// * `base_url` - URL the page was fetched from, used to resolve relative hrefs
///
/// # Returns
///
/// Absolute feed URLs, sorted and without duplicates. An unusable base URL
/// yields an empty set, which degrades the source to zero results instead
/// of aborting the crawl.
pub fn discover_feed_links(html: &str, base_url: &str) -> BTreeSet<String> {
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(e) => {
            warn!(%base_url, error = %e, "Cannot resolve feed links against base url");
            return BTreeSet::new();
        }
    };

    let document = Html::parse_document(html);
    let links: BTreeSet<String> = document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| is_feed_href(href))
        .filter_map(|href| match base.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!(%href, error = %e, "Skipping unresolvable feed link");
                None
            }
        })
        .collect();

    debug!(count = links.len(), %base_url, "Discovered feed links");
    links
}

fn is_feed_href(href: &str) -> bool {
    let lower = href.to_lowercase();
    !lower.starts_with("javascript:")
        && !lower.starts_with("mailto:")
        && FEED_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING: &str = r#"
        <html><body>
          <a href="/rss/topstories.xml">Top stories</a>
          <a href="https://www.cbc.ca/webfeed/rss/rss-canada">Canada</a>
          <a href="/atom/world">World</a>
          <a href="/FEED/local">Local</a>
          <a href="/about">About us</a>
          <a>No href</a>
          <a href="/rss/topstories.xml">Duplicate</a>
          <a href="mailto:rss@cbc.ca">Mail the rss team</a>
        </body></html>
    "#;

    #[test]
    fn test_discovers_only_feed_like_links() {
        let links = discover_feed_links(LANDING, "https://www.cbc.ca/rss/");
        let expected: BTreeSet<String> = [
            "https://www.cbc.ca/rss/topstories.xml",
            "https://www.cbc.ca/webfeed/rss/rss-canada",
            "https://www.cbc.ca/atom/world",
            "https://www.cbc.ca/FEED/local",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(links, expected);
    }

    #[test]
    fn test_relative_links_resolve_against_page_path() {
        let html = r#"<a href="news.rss">News</a>"#;
        let links = discover_feed_links(html, "https://globalnews.ca/pages/feeds/");
        assert!(links.contains("https://globalnews.ca/pages/feeds/news.rss"));
    }

    #[test]
    fn test_invalid_base_yields_empty_set() {
        assert!(discover_feed_links(LANDING, "not a url").is_empty());
    }

    #[test]
    fn test_garbage_html_yields_empty_set() {
        assert!(discover_feed_links("<<<>>> not html at all", "https://example.com").is_empty());
    }
}
