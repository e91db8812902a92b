//! Keyword predicates for the two filter stages.
//!
//! Both stages are case-insensitive substring tests with no stemming or
//! tokenization. Keywords are expected lower-cased (see
//! [`crate::config::normalize_words`]); the haystack is lower-cased here.

use crate::models::Entry;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));

const INVISIBLE: [&str; 4] = ["script", "style", "noscript", "template"];

fn contains_any(haystack: &str, words: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    words.iter().any(|word| haystack.contains(word.as_str()))
}

/// Title stage: does any keyword occur in the entry's title or description?
///
/// An empty description falls back to the entry's summary. With no keywords
/// this is always `false`; nothing survives stage one without title words.
pub fn title_matches(entry: &Entry, title_words: &[String]) -> bool {
    if title_words.is_empty() {
        return false;
    }
    let description = if entry.description.is_empty() {
        entry.summary.as_deref().unwrap_or("")
    } else {
        entry.description.as_str()
    };
    contains_any(&entry.title, title_words) || contains_any(description, title_words)
}

/// Body stage: does any keyword occur in the article's visible text?
pub fn body_matches(article_text: &str, body_words: &[String]) -> bool {
    !body_words.is_empty() && contains_any(article_text, body_words)
}

/// Text inside `<body>`, excluding script and style content.
///
/// A document with no body, or only markup, yields an empty string.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Some(body) = document.select(&BODY).next() else {
        return String::new();
    };

    let mut out = String::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}
