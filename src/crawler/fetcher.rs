//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the mirror, including:
//! - Building the HTTP client with the configured user agent
//! - Fetching directory listings as text
//! - Opening file downloads as byte streams
//! - Falling back from a mirror to the origin
//! - Error classification

use crate::config::{Config, UserAgentConfig};
use crate::crawler::mirror::{Attempt, MirrorResolver};
use crate::repo::RepoPath;
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Final outcome of a fetch once every base has been tried
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The last base answered with a client error; retrying will not help
    #[error("{url} returned HTTP {status}")]
    NotFound { url: String, status: u16 },

    /// Server error, timeout or connection failure
    #[error("{url}: {reason}")]
    Transient { url: String, reason: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::NotFound { url, .. } | Self::Transient { url, .. } => url,
        }
    }
}

/// A fetched directory listing
#[derive(Debug)]
pub struct Listing {
    pub body: String,

    /// Base that served the listing
    pub source: Url,
}

/// A file download whose headers have arrived
///
/// The body is still on the wire; the caller streams it to disk and gives up
/// once no data arrives for `idle_timeout`.
#[derive(Debug)]
pub struct Download {
    pub response: Response,

    /// Base that served the file
    pub source: Url,

    pub idle_timeout: Duration,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use mvn_mirror::config::UserAgentConfig;
/// use mvn_mirror::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "mvn-mirror".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: Some("https://example.com/about".to_string()),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Timeouts are applied per request phase; listings and files differ
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches listings and files through the mirror resolvers
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    index: MirrorResolver,
    download: MirrorResolver,
    listing_timeout: Duration,
    file_timeout: Duration,
}

impl Fetcher {
    pub fn new(
        client: Client,
        index: MirrorResolver,
        download: MirrorResolver,
        listing_timeout: Duration,
        file_timeout: Duration,
    ) -> Self {
        Self {
            client,
            index,
            download,
            listing_timeout,
            file_timeout,
        }
    }

    /// Builds a fetcher from the full configuration
    ///
    /// Listings use the `index` mirrors, files use the `download` mirrors;
    /// both fall back to the same origin.
    pub fn from_config(config: &Config) -> Result<Self, crate::MirrorError> {
        let client = build_http_client(&config.user_agent)?;
        let index = MirrorResolver::new(&config.mirrors.origin, &config.mirrors.index)?;
        let download = MirrorResolver::new(&config.mirrors.origin, &config.mirrors.download)?;

        Ok(Self::new(
            client,
            index,
            download,
            Duration::from_secs(config.crawler.listing_timeout_secs),
            Duration::from_secs(config.crawler.file_timeout_secs),
        ))
    }

    /// Fetches a directory listing
    ///
    /// # Request Flow
    ///
    /// 1. Pick one random index mirror (if any), then the origin
    /// 2. GET each URL in turn; headers and body each get the listing timeout
    /// 3. Return the first body read completely
    ///
    /// A failure at any base, including one while reading the body, moves on
    /// to the next base. The error of the last base is returned.
    pub async fn fetch_listing(&self, path: &RepoPath) -> Result<Listing, FetchError> {
        let attempts = self.index.attempts(path);
        let total = attempts.len();
        let mut last_error = None;

        for (idx, attempt) in attempts.into_iter().enumerate() {
            let result = match self.send(&attempt.url, self.listing_timeout).await {
                Ok(response) => {
                    let body = tokio::time::timeout(self.listing_timeout, response.text()).await;
                    match body {
                        Ok(text) => text.map_err(|e| classify_transport(&attempt.url, &e)),
                        Err(_) => Err(timed_out(&attempt.url)),
                    }
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(body) => {
                    return Ok(Listing {
                        body,
                        source: attempt.base,
                    })
                }
                Err(e) => {
                    log_failed_attempt(path, &attempt, idx + 1 < total, &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| no_endpoint(path)))
    }

    /// Opens a file download
    ///
    /// Only the response headers are awaited here, bounded by the file
    /// timeout; falling back happens on status and connection failures. The
    /// same timeout then bounds each wait for body data, so large files may
    /// take as long as they keep arriving. A body that breaks off mid-stream
    /// is reported by the caller.
    pub async fn fetch_file(&self, path: &RepoPath) -> Result<Download, FetchError> {
        let attempts = self.download.attempts(path);
        let total = attempts.len();
        let mut last_error = None;

        for (idx, attempt) in attempts.into_iter().enumerate() {
            match self.send(&attempt.url, self.file_timeout).await {
                Ok(response) => {
                    return Ok(Download {
                        response,
                        source: attempt.base,
                        idle_timeout: self.file_timeout,
                    })
                }
                Err(e) => {
                    log_failed_attempt(path, &attempt, idx + 1 < total, &e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| no_endpoint(path)))
    }

    /// Sends one GET and classifies anything but a 2xx answer
    ///
    /// `timeout` covers the request until the response headers are in.
    async fn send(&self, url: &Url, timeout: Duration) -> Result<Response, FetchError> {
        tracing::trace!("GET {}", url);

        let response = tokio::time::timeout(timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| timed_out(url))?
            .map_err(|e| classify_transport(url, &e))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status.is_client_error() {
            Err(FetchError::NotFound {
                url: url.to_string(),
                status: status.as_u16(),
            })
        } else {
            Err(FetchError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            })
        }
    }
}

/// Maps a transport-level error onto a transient failure
fn classify_transport(url: &Url, error: &reqwest::Error) -> FetchError {
    let reason = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else if error.is_redirect() {
        "too many redirects".to_string()
    } else {
        error.to_string()
    };

    FetchError::Transient {
        url: url.to_string(),
        reason,
    }
}

/// Transient failure for a request phase that ran out of time
fn timed_out(url: &Url) -> FetchError {
    FetchError::Transient {
        url: url.to_string(),
        reason: "request timeout".to_string(),
    }
}

fn log_failed_attempt(path: &RepoPath, attempt: &Attempt, has_next: bool, error: &FetchError) {
    if has_next {
        tracing::warn!(
            "Mirror {} failed for {} ({}), falling back",
            attempt.base,
            path,
            error
        );
    } else {
        tracing::debug!("Last base {} failed for {}: {}", attempt.base, path, error);
    }
}

fn no_endpoint(path: &RepoPath) -> FetchError {
    FetchError::Transient {
        url: path.to_string(),
        reason: "no usable endpoint".to_string(),
    }
}
