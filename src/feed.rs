//! Syndication document parsing.
//!
//! XML documents are classified by their root element first, so an HTML
//! page or some other stray document is reported as
//! [`ParseError::Unrecognized`] without attempting a full parse. Recognized
//! payloads go through `feed_rs`. It tolerates namespaced extension
//! elements such as `media:title` or `atom:link` inside items. The result
//! is tagged with the [`FeedFormat`] it was read as. A document that parses
//! but carries no usable entries is reported as [`ParseError::NoEntries`]
//! so callers can log and skip it.

use crate::error::ParseError;
use crate::models::Entry;
use feed_rs::model::{self, FeedType};
use feed_rs::parser;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::escape::{resolve_html5_entity, resolve_xml_entity};
use quick_xml::events::Event;
use regex::{Captures, Regex};
use scraper::Html;
use std::borrow::Cow;
use tracing::debug;

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("static regex"));

/// Known syndication formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Atom,
    /// RSS 0.9x and 2.0.
    Rss,
    /// RSS 1.0.
    Rdf,
    /// JSON Feed.
    Json,
}

/// Root elements of the XML formats, in the order they are checked.
const XML_ROOTS: [(&str, FeedFormat); 3] = [
    ("feed", FeedFormat::Atom),
    ("rss", FeedFormat::Rss),
    ("RDF", FeedFormat::Rdf),
];

impl FeedFormat {
    pub fn name(self) -> &'static str {
        match self {
            FeedFormat::Atom => "atom",
            FeedFormat::Rss => "rss",
            FeedFormat::Rdf => "rdf",
            FeedFormat::Json => "json",
        }
    }
}

impl From<FeedType> for FeedFormat {
    fn from(feed_type: FeedType) -> Self {
        match feed_type {
            FeedType::Atom => FeedFormat::Atom,
            FeedType::RSS0 | FeedType::RSS2 => FeedFormat::Rss,
            FeedType::RSS1 => FeedFormat::Rdf,
            FeedType::JSON => FeedFormat::Json,
        }
    }
}

/// Entries extracted from one feed payload.
#[derive(Debug)]
pub struct ParsedFeed {
    pub format: FeedFormat,
    pub entries: Vec<Entry>,
}

/// Rewrite HTML named entities that XML does not define.
///
/// `&nbsp;` and friends become numeric character references. Names that
/// are not HTML entities either are escaped so they read as literal text.
fn normalize_entities(xml: &str) -> Cow<'_, str> {
    NAMED_ENTITY.replace_all(xml, |caps: &Captures| {
        let name = &caps[1];
        if resolve_xml_entity(name).is_some() {
            caps[0].to_string()
        } else if let Some(resolved) = resolve_html5_entity(name) {
            resolved.chars().map(|c| format!("&#x{:x};", c as u32)).collect()
        } else {
            format!("&amp;{name};")
        }
    })
}

/// Local name of the first element in `xml`.
fn root_element(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err(ParseError::Malformed("document has no elements".to_string())),
            Ok(_) => continue,
            Err(e) => return Err(ParseError::Malformed(e.to_string())),
        }
    }
}

fn classify(document: &str) -> Result<FeedFormat, ParseError> {
    if document.starts_with('{') {
        return Ok(FeedFormat::Json);
    }
    let root = root_element(document)?;
    XML_ROOTS
        .iter()
        .find(|(name, _)| *name == root)
        .map(|(_, format)| *format)
        .ok_or(ParseError::Unrecognized(root))
}

/// Collapse whitespace and strip any embedded markup.
fn strip_markup(content: &str) -> String {
    let raw = if content.contains('<') {
        Html::parse_fragment(content)
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        content.to_string()
    };
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn plain_text(text: Option<model::Text>) -> String {
    text.map(|t| strip_markup(&t.content)).unwrap_or_default()
}

/// The entry's page: an `alternate` (or unlabelled) link first, then any
/// link, then an `id` that is itself a URI. Generated ids are never URIs.
fn entry_link(links: &[model::Link], id: &str) -> Option<String> {
    let usable = |l: &&model::Link| !l.href.trim().is_empty();
    links
        .iter()
        .filter(usable)
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.iter().find(usable))
        .map(|l| l.href.trim().to_string())
        .or_else(|| {
            let id = id.trim();
            id.contains(':').then(|| id.to_string())
        })
}

fn into_entry(entry: model::Entry) -> Option<Entry> {
    let link = entry_link(&entry.links, &entry.id)?;
    let content = entry
        .content
        .and_then(|c| c.body)
        .map(|body| strip_markup(&body))
        .filter(|body| !body.is_empty());

    let parsed = Entry::new(plain_text(entry.title), plain_text(entry.summary), link);
    Some(match content {
        Some(content) => parsed.with_summary(content),
        None => parsed,
    })
}

/// Parse a fetched feed payload into entries.
///
/// # Arguments
///
/// * `payload` - Raw bytes of an RSS, Atom, RDF or JSON Feed document
///
/// # Returns
///
/// The detected [`FeedFormat`] and every entry that has a link. Entries
/// without a link fall back to a URI-shaped `id` (Atom `id`, RSS `guid`);
/// an entry with neither is dropped.
///
/// # Errors
///
/// - [`ParseError::Unrecognized`] when the root element is not a feed
/// - [`ParseError::Malformed`] when the document cannot be read
/// - [`ParseError::NoEntries`] when no entry has a usable link
pub fn parse_feed(payload: &[u8]) -> Result<ParsedFeed, ParseError> {
    let decoded = String::from_utf8_lossy(payload);
    let document = normalize_entities(decoded.trim_start_matches('\u{feff}').trim_start());

    let sniffed = classify(&document)?;
    let feed = parser::parse(document.as_bytes()).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let format = FeedFormat::from(feed.feed_type);
    if format != sniffed {
        debug!(sniffed = sniffed.name(), parsed = format.name(), "Feed type differs from root element");
    }

    let total = feed.entries.len();
    let entries: Vec<Entry> = feed.entries.into_iter().filter_map(into_entry).collect();
    if entries.len() < total {
        debug!(dropped = total - entries.len(), format = format.name(), "Dropped entries without any link");
    }
    if entries.is_empty() {
        return Err(ParseError::NoEntries(format.name()));
    }

    Ok(ParsedFeed { format, entries })
}
