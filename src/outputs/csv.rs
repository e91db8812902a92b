//! Delimited output with an `index,Title,Link` header.
//!
//! Fields are quoted per RFC 4180 only when they contain a comma, a quote,
//! or a line break. Records end in CRLF.

use crate::models::CrawlResult;

const HEADER: &str = "index,Title,Link";

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render results as CSV, numbering rows from zero.
pub fn to_csv(results: &[CrawlResult]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("\r\n");
    for (index, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "{index},{},{}\r\n",
            escape(&result.title),
            escape(&result.link)
        ));
    }
    out
}
