//! JSON output: an array of `{ "Title", "Link" }` objects.

use crate::models::CrawlResult;

/// Pretty-printed so the file is readable by hand.
pub fn to_json(results: &[CrawlResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}
