//! Sources whose listing only exists after script execution.
//!
//! A rendered listing (for example a police press-release index) is a
//! table of description cells and article anchors spread over several
//! client-side pages. A headless Chrome session walks it as a state
//! machine:
//!
//! ```text
//! Loading -> Extracting -> AwaitingPagination -> Advancing -> Loading -> ...
//!                                  |
//!                                  +-> Done         (last page reached)
//! any step failing ------------------> Error        (rows gathered so far are kept)
//! ```
//!
//! `total_pages` is read once, as the largest numeral among the pagination
//! control labels of the first page. Each article link is then rendered in
//! its own tab so concurrent fetches never share DOM state.
//!
//! The browser is launched lazily, once per source instance, and is shut
//! down when the source is dropped. Tabs close when their guard drops,
//! including on early returns.

use crate::config::{CrawlConfig, ListingSelectors};
use crate::error::{FailureKind, FetchError, RenderError};
use crate::fetch::normalize_url;
use crate::filter::title_matches;
use crate::models::{Article, Entry};
use headless_chrome::{Browser, LaunchOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

/// Keeps the browser alive between listing and article rendering.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

static NUMERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

/// Position in a paginated listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    /// Pages extracted so far.
    pub page_index: usize,
    /// Discovered on the first page; `None` until then.
    pub total_pages: Option<usize>,
}

/// States of the pagination walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingState {
    /// Navigating to `navigate` if set, then waiting for the rows to attach.
    Loading { navigate: Option<String> },
    Extracting,
    AwaitingPagination,
    Advancing,
    Done,
    Error(RenderError),
}

/// What a pagination walk produced.
#[derive(Debug)]
pub struct ListingOutcome {
    pub entries: Vec<Entry>,
    pub cursor: PageCursor,
    /// Either [`ListingState::Done`] or [`ListingState::Error`].
    pub state: ListingState,
}

impl ListingOutcome {
    /// Whether the walk reached the last page rather than stopping on an error.
    pub fn is_complete(&self) -> bool {
        self.state == ListingState::Done
    }
}

/// Browser operations needed to walk a listing.
pub trait ListingDriver {
    /// Navigate to `url` and wait for the document to load.
    fn open(&mut self, url: &str) -> Result<(), RenderError>;
    /// Wait for the listing rows to attach. Script-filled tables may still
    /// be empty when navigation completes.
    fn wait_for_listing(&mut self) -> Result<(), RenderError>;
    /// Current rendered DOM as HTML.
    fn page_html(&mut self) -> Result<String, RenderError>;
    /// Wait for the pagination controls and return their labels.
    fn pagination_labels(&mut self) -> Result<Vec<String>, RenderError>;
    /// Invoke the "next page" control.
    fn advance(&mut self) -> Result<(), RenderError>;
}

/// Largest numeral across all pagination labels.
pub fn total_pages_from_labels(labels: &[String]) -> Option<usize> {
    labels
        .iter()
        .flat_map(|label| NUMERAL.find_iter(label))
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .max()
}

fn compile(selector: &str) -> Result<Selector, RenderError> {
    Selector::parse(selector).map_err(|e| RenderError::Extraction(format!("bad selector {selector}: {e}")))
}

/// Pair description cells with anchors by position and keep the rows whose
/// description mentions a title word.
pub fn extract_rows(
    html: &str,
    selectors: &ListingSelectors,
    title_words: &[String],
    base: Option<&Url>,
) -> Result<Vec<Entry>, RenderError> {
    let description = compile(&selectors.description_selector)?;
    let anchor = compile(&selectors.link_selector)?;
    let document = Html::parse_document(html);

    let rows = document
        .select(&description)
        .zip(document.select(&anchor))
        .filter_map(|(cell, link)| {
            let text = cell.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            let href = link.value().attr("href")?.trim();
            let href = base
                .and_then(|b| b.join(href).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| href.to_string());
            let entry = Entry::new(text.clone(), text, href);
            title_matches(&entry, title_words).then_some(entry)
        })
        .collect();
    Ok(rows)
}

/// Walk a listing from `start_url` until the last page, `max_pages`, or the
/// first failure.
pub fn paginate<D: ListingDriver>(
    driver: &mut D,
    start_url: &str,
    selectors: &ListingSelectors,
    title_words: &[String],
    max_pages: usize,
) -> ListingOutcome {
    let base = Url::parse(start_url).ok();
    let mut cursor = PageCursor::default();
    let mut entries = Vec::new();
    let mut state = ListingState::Loading {
        navigate: Some(start_url.to_string()),
    };

    loop {
        trace!(?state, ?cursor, "Listing state");
        state = match state {
            ListingState::Loading { navigate } => {
                let loaded = match navigate {
                    Some(url) => driver.open(&url).and_then(|()| driver.wait_for_listing()),
                    None => driver.wait_for_listing(),
                };
                match loaded {
                    Ok(()) => ListingState::Extracting,
                    Err(e) => ListingState::Error(e),
                }
            }
            ListingState::Extracting => {
                match driver
                    .page_html()
                    .and_then(|html| extract_rows(&html, selectors, title_words, base.as_ref()))
                {
                    Ok(rows) => {
                        cursor.page_index += 1;
                        debug!(page = cursor.page_index, matched = rows.len(), "Extracted listing page");
                        entries.extend(rows);
                        ListingState::AwaitingPagination
                    }
                    Err(e) => ListingState::Error(e),
                }
            }
            ListingState::AwaitingPagination => {
                if cursor.total_pages.is_some_and(|total| cursor.page_index >= total) {
                    ListingState::Done
                } else {
                    match driver.pagination_labels() {
                        Ok(labels) => {
                            let total = *cursor.total_pages.get_or_insert_with(|| {
                                total_pages_from_labels(&labels).unwrap_or(1).clamp(1, max_pages.max(1))
                            });
                            if cursor.page_index >= total {
                                ListingState::Done
                            } else {
                                ListingState::Advancing
                            }
                        }
                        Err(e) => ListingState::Error(e),
                    }
                }
            }
            ListingState::Advancing => match driver.advance() {
                Ok(()) => ListingState::Loading { navigate: None },
                Err(e) => ListingState::Error(e),
            },
            terminal => {
                if let ListingState::Error(e) = &terminal {
                    warn!(error = %e, pages = cursor.page_index, kept = entries.len(), "Listing walk ended early");
                }
                return ListingOutcome {
                    entries,
                    cursor,
                    state: terminal,
                };
            }
        };
    }
}

/// A tab that closes itself when dropped.
struct RenderTab {
    inner: Arc<headless_chrome::Tab>,
}

impl RenderTab {
    fn open(browser: &Browser, wait: Duration) -> Result<Self, RenderError> {
        let inner = browser
            .new_tab()
            .map_err(|e| RenderError::Session(e.to_string()))?;
        inner.set_default_timeout(wait);
        Ok(Self { inner })
    }

    fn navigate(&self, url: &str) -> Result<(), RenderError> {
        self.inner
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    fn content(&self) -> Result<String, RenderError> {
        self.inner
            .get_content()
            .map_err(|e| RenderError::Extraction(e.to_string()))
    }
}

impl Drop for RenderTab {
    fn drop(&mut self) {
        let _ = self.inner.close(true);
    }
}

/// [`ListingDriver`] backed by a headless Chrome tab.
struct ChromeListingDriver {
    tab: RenderTab,
    selectors: ListingSelectors,
}

impl ListingDriver for ChromeListingDriver {
    fn open(&mut self, url: &str) -> Result<(), RenderError> {
        self.tab.navigate(url)
    }

    fn wait_for_listing(&mut self) -> Result<(), RenderError> {
        self.tab
            .inner
            .wait_for_elements(&self.selectors.description_selector)
            .map(|_| ())
            .map_err(|e| RenderError::Pagination(e.to_string()))
    }

    fn page_html(&mut self) -> Result<String, RenderError> {
        self.tab.content()
    }

    fn pagination_labels(&mut self) -> Result<Vec<String>, RenderError> {
        let controls = self
            .tab
            .inner
            .wait_for_elements(&self.selectors.pagination_selector)
            .map_err(|e| RenderError::Pagination(e.to_string()))?;
        controls
            .iter()
            .map(|c| c.get_inner_text().map_err(|e| RenderError::Pagination(e.to_string())))
            .collect()
    }

    fn advance(&mut self) -> Result<(), RenderError> {
        let controls = self
            .tab
            .inner
            .wait_for_elements(&self.selectors.pagination_selector)
            .map_err(|e| RenderError::Pagination(e.to_string()))?;
        let next = controls
            .last()
            .ok_or_else(|| RenderError::Pagination("no pagination controls".to_string()))?;
        next.click()
            .map_err(|e| RenderError::Pagination(e.to_string()))?;
        Ok(())
    }
}

fn launch_browser() -> Result<Browser, RenderError> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
        .build()
        .map_err(|e| RenderError::Session(e.to_string()))?;
    Browser::new(options).map_err(|e| RenderError::Session(e.to_string()))
}

/// Render `url` in a fresh tab and return its DOM.
fn render_page(browser: &Browser, url: &str, wait: Duration) -> Result<String, RenderError> {
    let tab = RenderTab::open(browser, wait)?;
    tab.navigate(url)?;
    tab.content()
}

/// A script-rendered, paginated listing.
pub struct RenderedFeedSource {
    name: String,
    listing_url: Url,
    selectors: ListingSelectors,
    session: OnceCell<Arc<Browser>>,
}

impl std::fmt::Debug for RenderedFeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedFeedSource")
            .field("name", &self.name)
            .field("listing_url", &self.listing_url.as_str())
            .field("session_started", &self.session.initialized())
            .finish()
    }
}

impl RenderedFeedSource {
    pub fn new(name: impl Into<String>, listing_url: Url, selectors: ListingSelectors) -> Self {
        Self {
            name: name.into(),
            listing_url,
            selectors,
            session: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// This source's browser, launched on first use.
    async fn session(&self) -> Result<Arc<Browser>, RenderError> {
        self.session
            .get_or_try_init(|| async {
                info!(source = %self.name, "Launching headless browser");
                tokio::task::spawn_blocking(launch_browser)
                    .await
                    .map_err(|e| RenderError::Session(e.to_string()))?
                    .map(Arc::new)
            })
            .await
            .cloned()
    }

    /// Rows of the listing whose description mentions a title word.
    #[instrument(level = "info", skip_all, fields(source = %self.name))]
    pub async fn list_entries(&self, config: &CrawlConfig) -> Vec<Entry> {
        let browser = match self.session().await {
            Ok(browser) => browser,
            Err(e) => {
                warn!(error = %e, "Browser unavailable; source contributes nothing");
                return Vec::new();
            }
        };

        let start_url = self.listing_url.to_string();
        let selectors = self.selectors.clone();
        let title_words = config.title_words.clone();
        let page_wait = config.page_wait;
        let max_pages = config.max_pages;

        let walked = tokio::task::spawn_blocking(move || {
            let tab = RenderTab::open(&browser, page_wait)?;
            let mut driver = ChromeListingDriver {
                tab,
                selectors: selectors.clone(),
            };
            Ok::<_, RenderError>(paginate(&mut driver, &start_url, &selectors, &title_words, max_pages))
        })
        .await;

        match walked {
            Ok(Ok(outcome)) => {
                info!(
                    pages = outcome.cursor.page_index,
                    total_pages = ?outcome.cursor.total_pages,
                    complete = outcome.is_complete(),
                    count = outcome.entries.len(),
                    "Listed rendered entries"
                );
                outcome.entries
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Could not open listing tab");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Listing task failed");
                Vec::new()
            }
        }
    }

    /// Render one article link in its own tab.
    pub async fn fetch_body(&self, link: &str, config: &CrawlConfig) -> Result<Vec<u8>, FetchError> {
        let url = normalize_url(link, Some(&self.listing_url))?;
        let browser = self.session().await.map_err(|e| e.into_fetch_error(link))?;
        let wait = config.request_timeout;
        let target = url.to_string();

        tokio::task::spawn_blocking(move || render_page(&browser, &target, wait))
            .await
            .map_err(|e| FetchError::new(link, FailureKind::Render, e.to_string()))?
            .map(String::into_bytes)
            .map_err(|e| e.into_fetch_error(link))
    }

    /// The article page's heading, or the listing snippet if it has none.
    pub fn result_title(&self, article: &Article) -> String {
        article_heading(&article.body, &self.selectors.title_selector)
            .unwrap_or_else(|| article.entry.title.clone())
    }
}

fn article_heading(body: &[u8], selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let document = Html::parse_document(&String::from_utf8_lossy(body));
    let heading = document.select(&selector).next()?;
    let text = heading.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted listing: one HTML document per page.
    struct ScriptedDriver {
        pages: Vec<String>,
        labels: Vec<String>,
        current: usize,
        fail_open: bool,
        fail_advance_on: Option<usize>,
        labels_missing: bool,
        rows_attached: bool,
        opens: usize,
        waits: usize,
        advances: usize,
        extractions: usize,
    }

    impl ScriptedDriver {
        fn new(pages: Vec<String>, labels: &[&str]) -> Self {
            Self {
                pages,
                labels: labels.iter().map(|l| l.to_string()).collect(),
                current: 0,
                fail_open: false,
                fail_advance_on: None,
                labels_missing: false,
                rows_attached: false,
                opens: 0,
                waits: 0,
                advances: 0,
                extractions: 0,
            }
        }
    }

    impl ListingDriver for ScriptedDriver {
        fn open(&mut self, url: &str) -> Result<(), RenderError> {
            self.opens += 1;
            self.rows_attached = false;
            if self.fail_open {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
            Ok(())
        }

        fn wait_for_listing(&mut self) -> Result<(), RenderError> {
            self.waits += 1;
            self.rows_attached = true;
            Ok(())
        }

        fn page_html(&mut self) -> Result<String, RenderError> {
            self.extractions += 1;
            // Before the script runs the table is present but empty
            if !self.rows_attached {
                return Ok(page(&[]));
            }
            self.pages
                .get(self.current)
                .cloned()
                .ok_or_else(|| RenderError::Extraction("past last page".to_string()))
        }

        fn pagination_labels(&mut self) -> Result<Vec<String>, RenderError> {
            if self.labels_missing {
                return Err(RenderError::Pagination("timed out waiting for controls".to_string()));
            }
            Ok(self.labels.clone())
        }

        fn advance(&mut self) -> Result<(), RenderError> {
            if self.fail_advance_on == Some(self.current) {
                return Err(RenderError::Pagination("click intercepted".to_string()));
            }
            self.advances += 1;
            self.current += 1;
            self.rows_attached = false;
            Ok(())
        }
    }

    fn page(rows: &[(&str, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(desc, href)| {
                format!(
                    "<tr><td><a class=\"h4\" href=\"{href}\">Release</a></td><td class=\"nws-tbl-desc mrgn-bbtm-md\">{desc}</td></tr>"
                )
            })
            .collect();
        format!("<html><body><table>{body}</table></body></html>")
    }

    fn selectors() -> ListingSelectors {
        ListingSelectors::default()
    }

    fn words() -> Vec<String> {
        vec!["drug".to_string()]
    }

    const START: &str = "https://rcmp.ca/en/news";

    #[test]
    fn test_total_pages_is_max_numeral() {
        let labels: Vec<String> = ["Previous", "1", "2", "…", "37", "Next"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(total_pages_from_labels(&labels), Some(37));
        assert_eq!(total_pages_from_labels(&["Next".to_string()]), None);
    }

    #[test]
    fn test_extract_rows_pairs_by_position_and_filters() {
        let html = page(&[
            ("RCMP seizes DRUGS in Surrey", "/en/news/2024/1"),
            ("Missing person found", "/en/news/2024/2"),
            ("Drug trafficking charges laid", "https://rcmp.ca/en/news/2024/3"),
        ]);
        let base = Url::parse(START).unwrap();
        let rows = extract_rows(&html, &selectors(), &words(), Some(&base)).unwrap();
        let links: Vec<_> = rows.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://rcmp.ca/en/news/2024/1", "https://rcmp.ca/en/news/2024/3"]
        );
        assert_eq!(rows[0].title, "RCMP seizes DRUGS in Surrey");
    }

    #[test]
    fn test_extract_rows_rejects_bad_selector() {
        let mut bad = selectors();
        bad.link_selector = "a[".to_string();
        assert!(matches!(
            extract_rows("<html></html>", &bad, &words(), None),
            Err(RenderError::Extraction(_))
        ));
    }

    #[test]
    fn test_single_page_extracts_once_and_never_advances() {
        let mut driver = ScriptedDriver::new(vec![page(&[("drug bust", "/a")])], &["1"]);
        let outcome = paginate(&mut driver, START, &selectors(), &words(), 50);
        assert!(outcome.is_complete());
        assert_eq!(driver.extractions, 1);
        assert_eq!(driver.advances, 0);
        assert_eq!(outcome.cursor, PageCursor { page_index: 1, total_pages: Some(1) });
        assert_eq!(outcome.entries.len(), 1);
    }

    #[test]
    fn test_first_page_waits_for_script_rows() {
        let mut driver = ScriptedDriver::new(vec![page(&[("drug bust", "/a"), ("drug raid", "/b")])], &["1"]);
        let outcome = paginate(&mut driver, START, &selectors(), &words(), 50);
        assert_eq!(driver.waits, 1);
        assert_eq!(outcome.entries.len(), 2);
    }

    #[test]
    fn test_walks_every_page() {
        let pages = vec![
            page(&[("drug bust one", "/1"), ("traffic stop", "/2")]),
            page(&[("drug bust two", "/3")]),
            page(&[("drug bust three", "/4")]),
        ];
        let mut driver = ScriptedDriver::new(pages, &["Previous", "1", "2", "3", "Next"]);
        let outcome = paginate(&mut driver, START, &selectors(), &words(), 50);
        assert_eq!(outcome.state, ListingState::Done);
        assert_eq!(driver.opens, 1);
        assert_eq!(driver.advances, 2);
        assert_eq!(driver.extractions, 3);
        let links: Vec<_> = outcome.entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://rcmp.ca/1", "https://rcmp.ca/3", "https://rcmp.ca/4"]
        );
    }

    #[test]
    fn test_max_pages_caps_the_walk() {
        let pages = vec![page(&[("drug 1", "/1")]), page(&[("drug 2", "/2")]), page(&[("drug 3", "/3")])];
        let mut driver = ScriptedDriver::new(pages, &["1", "2", "999"]);
        let outcome = paginate(&mut driver, START, &selectors(), &words(), 2);
        assert_eq!(outcome.cursor.total_pages, Some(2));
        assert_eq!(driver.extractions, 2);
        assert_eq!(outcome.entries.len(), 2);
    }

    #[test]
    fn test_click_failure_keeps_rows_already_extracted() {
        let pages = vec![page(&[("drug 1", "/1")]), page(&[("drug 2", "/2")]), page(&[("drug 3", "/3")])];
        let mut driver = ScriptedDriver::new(pages, &["1", "2", "3"]);
        driver.fail_advance_on = Some(1);
        let outcome = paginate(&mut driver, START, &selectors(), &words(), 50);
        assert!(matches!(outcome.state, ListingState::Error(RenderError::Pagination(_))));
        assert!(!outcome.is_complete());
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.cursor.page_index, 2);
    }

    #[test]
    fn test_missing_pagination_controls_keeps_first_page() {
        let mut driver = ScriptedDriver::new(vec![page(&[("drug 1", "/1")])], &[]);
        driver.labels_missing = true;
        let outcome = paginate(&mut driver, START, &selectors(), &words(), 50);
        assert!(matches!(outcome.state, ListingState::Error(RenderError::Pagination(_))));
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.cursor.total_pages, None);
    }

    #[test]
    fn test_navigation_failure_yields_nothing() {
        let mut driver = ScriptedDriver::new(vec![page(&[("drug 1", "/1")])], &["1"]);
        driver.fail_open = true;
        let outcome = paginate(&mut driver, START, &selectors(), &words(), 50);
        assert!(matches!(outcome.state, ListingState::Error(RenderError::Navigation { .. })));
        assert!(outcome.entries.is_empty());
        assert_eq!(driver.extractions, 0);
    }

    #[test]
    fn test_article_heading_prefers_page_title() {
        let body = b"<html><body><h1 class=\"mrgn-tp-md\">  RCMP lays   charges </h1></body></html>";
        assert_eq!(
            article_heading(body, "h1.mrgn-tp-md").as_deref(),
            Some("RCMP lays charges")
        );
        assert_eq!(article_heading(b"<html><body></body></html>", "h1"), None);
    }

    #[test]
    fn test_result_title_falls_back_to_listing_snippet() {
        let source = RenderedFeedSource::new("rcmp", Url::parse(START).unwrap(), selectors());
        let article = Article {
            entry: Entry::new("drug bust snippet", "drug bust snippet", "https://rcmp.ca/1"),
            body: b"<html><body><p>no heading</p></body></html>".to_vec(),
        };
        assert_eq!(source.result_title(&article), "drug bust snippet");
    }
}
