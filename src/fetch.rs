//! Single-shot HTTP fetching shared by every strategy.
//!
//! A fetch is attempted once with a fixed timeout. Non-2xx statuses and
//! transport failures come back as [`FetchError`]; nothing panics or
//! retries past this boundary.

use crate::error::{FailureKind, FetchError};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Desktop browser identification sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Resolve a possibly partial URL into an absolute http(s) URL.
///
/// - `//host/path` gets an `https:` scheme
/// - a string with no host is joined onto `base`
/// - with no `base`, a bare `host/path` gets an `https://` prefix
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<Url, FetchError> {
    let raw = raw.trim();
    let invalid = |message: String| FetchError::new(raw, FailureKind::InvalidUrl, message);

    if raw.is_empty() {
        return Err(invalid("empty url".to_string()));
    }

    let parsed = if raw.starts_with("//") {
        Url::parse(&format!("https:{raw}"))
    } else {
        match Url::parse(raw) {
            Err(url::ParseError::RelativeUrlWithoutBase) => match base {
                Some(base) => base.join(raw),
                None => Url::parse(&format!("https://{raw}")),
            },
            other => other,
        }
    };

    let url = parsed.map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// HTTP client bound to one source's base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Option<Url>,
}

impl HttpFetcher {
    /// Build a client with the browser user agent and a per-request timeout.
    ///
    /// Failing here means no network access is possible at all, so the
    /// caller should treat it as fatal.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base: None })
    }

    /// A copy of this fetcher that resolves relative URLs against `base`.
    pub fn with_base(&self, base: Url) -> Self {
        Self {
            client: self.client.clone(),
            base: Some(base),
        }
    }

    /// GET `url` and return the raw body bytes.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let target = normalize_url(url, self.base.as_ref())?;

        let response = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(target.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                target.as_str(),
                FailureKind::HttpStatus(status.as_u16()),
                status.canonical_reason().unwrap_or("Unknown"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(target.as_str(), e))?;

        debug!(url = %target, bytes = bytes.len(), "Fetched");
        Ok(bytes.to_vec())
    }
}
