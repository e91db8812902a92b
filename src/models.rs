//! Data models shared by the crawl stages.
//!
//! - [`Entry`]: one syndication item or listing row, before its body is fetched
//! - [`Article`]: the fetched body of an entry's link, alive only while body-filtering
//! - [`CrawlResult`]: the externally visible `(title, link)` pair that survived both filters
//!
//! Serialized field names are capitalised (`Title`, `Link`) to match the
//! column headers of the output files.

use serde::{Deserialize, Serialize};

/// One feed item or listing row.
///
/// `link` is an absolute URL where one could be resolved, otherwise a
/// provider-issued identifier (Atom `id`, RSS `guid`) used as a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    /// May be empty.
    pub description: String,
    /// Secondary text consulted by the title stage when `description` is empty.
    pub summary: Option<String>,
    pub link: String,
}

impl Entry {
    pub fn new(title: impl Into<String>, description: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            summary: None,
            link: link.into(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// The raw body fetched for an entry's link.
#[derive(Debug)]
pub struct Article {
    pub entry: Entry,
    pub body: Vec<u8>,
}

/// A final `(title, link)` pair. Identified by `link` for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrawlResult {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Link")]
    pub link: String,
}

impl CrawlResult {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let entry = Entry::new("Title", "", "https://example.com/1").with_summary("fallback");
        assert_eq!(entry.description, "");
        assert_eq!(entry.summary.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_crawl_result_serialization_uses_column_names() {
        let result = CrawlResult::new("New drug task force announced", "https://example.com/a");
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"Title":"New drug task force announced","Link":"https://example.com/a"}"#
        );
    }

    #[test]
    fn test_crawl_result_deserialization() {
        let json = r#"{"Title":"t","Link":"l"}"#;
        let result: CrawlResult = serde_json::from_str(json).unwrap();
        assert_eq!(result, CrawlResult::new("t", "l"));
    }
}
