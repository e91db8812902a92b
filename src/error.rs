//! Error taxonomy for the crawler.
//!
//! Every error in this module is caught at the boundary where it occurs and
//! turned into "this unit produced nothing". None of them abort a sibling
//! task or the whole crawl. The only fatal conditions are configuration
//! errors and failing to build the HTTP client at all, which surface from
//! `main`.

use std::fmt;
use thiserror::Error;

/// Why a single fetch produced no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Timeout,
    HttpStatus(u16),
    Network,
    /// A headless browser could not render the page.
    Render,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Timeout => write!(f, "timed out"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Network => write!(f, "network failure"),
            FailureKind::Render => write!(f, "render failure"),
        }
    }
}

/// A fetch that failed; degrades to "no content" for that one link.
#[derive(Debug, Clone, Error)]
#[error("fetch of {url} failed ({kind}): {message}")]
pub struct FetchError {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if let Some(status) = err.status() {
            FailureKind::HttpStatus(status.as_u16())
        } else if err.is_builder() {
            FailureKind::InvalidUrl
        } else {
            FailureKind::Network
        };
        Self::new(url, kind, err.to_string())
    }
}

/// A feed payload that could not be turned into entries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed syndication document: {0}")]
    Malformed(String),
    #[error("unrecognized document root <{0}>")]
    Unrecognized(String),
    #[error("{0} document contains no entries")]
    NoEntries(&'static str),
}

/// Failures of the headless browser strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("browser session unavailable: {0}")]
    Session(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("pagination failed: {0}")]
    Pagination(String),
    #[error("could not read rendered page: {0}")]
    Extraction(String),
}

impl RenderError {
    /// A page that cannot render counts as a failed fetch of that link.
    pub fn into_fetch_error(self, url: &str) -> FetchError {
        FetchError::new(url, FailureKind::Render, self.to_string())
    }
}

/// Problems loading the source registry or crawl settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid source registry: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("source {name} has an invalid base url {url}: {source}")]
    InvalidUrl {
        name: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("source registry lists no sources")]
    Empty,
}
