//! Blocking HTTP gateway with ETag/Last-Modified revalidation.
//!
//! Three request shapes are needed:
//!
//! - **once**: fetch a file that never changes (package manifests) unless it
//!   is already on disk.
//! - **conditional**: refresh a file that changes over time (repository
//!   lists), revalidating with cache headers and optionally skipping the
//!   request entirely if the last one was recent enough. When the request
//!   fails and an older copy exists, the older copy is used.
//! - **post**: stream the response of a `streamer.cgi` request.
//!
//! Revalidation state lives in an INI file, one section per `url,file`
//! pair, with keys `etag`, `last_modified` and `last_requested`.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use ini::Ini;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use thiserror::Error;
use tracing::{debug, warn};

use super::atomic_write;
use crate::config::{load_ini, save_ini};

/// Network or filesystem failure while transferring a file.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request failed or the server answered with an error status.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Nothing is served at the URL.
    #[error("{url}: not found")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// The response could not be stored.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Destination file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// What a conditional fetch did to the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New content was written.
    Downloaded,
    /// The server confirmed the local copy is current.
    NotModified,
    /// No request was made; the local copy is recent enough.
    RateLimited,
    /// The request failed; the existing local copy was kept.
    Stale,
}

/// Streaming response to a POST request.
pub struct PostResponse {
    /// Total body length announced by the server, if any.
    pub content_length: Option<u64>,
    /// Response body.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for PostResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// The network operations the catalog and installer rely on.
pub trait Transfer: Send + Sync {
    /// Download `url` to `dest` unless `dest` already exists.
    ///
    /// # Errors
    ///
    /// Propagates every failure; there is nothing to fall back to.
    fn fetch_once(&self, url: &str, dest: &Path) -> Result<(), TransferError>;

    /// Refresh `dest` from `url`, revalidating an existing copy.
    ///
    /// With `rate_limit` set, no request is made if the previous one for the
    /// same pair is younger than the limit and `dest` exists.
    ///
    /// # Errors
    ///
    /// Fails only if the request fails and `dest` does not exist yet.
    fn fetch_conditional(
        &self,
        url: &str,
        dest: &Path,
        rate_limit: Option<Duration>,
    ) -> Result<FetchOutcome, TransferError>;

    /// POST `body` to `url` and return the streaming response.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<PostResponse, TransferError>;
}

impl<T: Transfer + ?Sized> Transfer for std::sync::Arc<T> {
    fn fetch_once(&self, url: &str, dest: &Path) -> Result<(), TransferError> {
        (**self).fetch_once(url, dest)
    }
    fn fetch_conditional(
        &self,
        url: &str,
        dest: &Path,
        rate_limit: Option<Duration>,
    ) -> Result<FetchOutcome, TransferError> {
        (**self).fetch_conditional(url, dest, rate_limit)
    }
    fn post(&self, url: &str, body: Vec<u8>) -> Result<PostResponse, TransferError> {
        (**self).post(url, body)
    }
}

/// [`Transfer`] over HTTP with a blocking `reqwest` client.
pub struct HttpTransfer {
    client: Client,
    state_path: PathBuf,
    state: Mutex<Ini>,
}

impl fmt::Debug for HttpTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransfer")
            .field("state_path", &self.state_path)
            .finish_non_exhaustive()
    }
}

impl HttpTransfer {
    /// Create a transfer persisting revalidation state in `state_path`.
    ///
    /// An unreadable state file is discarded with a warning; it only holds
    /// cache hints.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Client`] if the HTTP client cannot be built.
    pub fn new(state_path: impl Into<PathBuf>, timeout: Duration) -> Result<Self, TransferError> {
        let state_path = state_path.into();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(TransferError::Client)?;

        let state = load_ini(&state_path).unwrap_or_else(|e| {
            warn!("discarding unreadable {}: {e}", state_path.display());
            Ini::new()
        });

        Ok(Self {
            client,
            state_path,
            state: Mutex::new(state),
        })
    }

    fn state_get(&self, section: &str, key: &str) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .section(Some(section))
            .and_then(|s| s.get(key))
            .map(str::to_string)
    }

    /// Record response headers; absent or empty values keep the old ones.
    fn record(&self, section: &str, etag: Option<&str>, last_modified: Option<&str>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entry = state.with_section(Some(section));
        if let Some(etag) = etag.filter(|v| !v.is_empty()) {
            entry.set("etag", etag);
        }
        if let Some(lm) = last_modified.filter(|v| !v.is_empty()) {
            entry.set("last_modified", lm);
        }
        entry.set("last_requested", now_secs().to_string());

        if let Err(e) = save_ini(&self.state_path, &state) {
            warn!("failed to save {}: {e}", self.state_path.display());
        }
    }

    fn write(dest: &Path, data: &[u8]) -> Result<(), TransferError> {
        atomic_write(dest, data).map_err(|source| TransferError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }
}

impl Transfer for HttpTransfer {
    fn fetch_once(&self, url: &str, dest: &Path) -> Result<(), TransferError> {
        if dest.exists() {
            return Ok(());
        }
        debug!("GET {url}");
        let http = |source| TransferError::Http {
            url: url.to_string(),
            source,
        };
        let body = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::bytes)
            .map_err(http)?;
        Self::write(dest, &body)
    }

    fn fetch_conditional(
        &self,
        url: &str,
        dest: &Path,
        rate_limit: Option<Duration>,
    ) -> Result<FetchOutcome, TransferError> {
        let section = format!("{url},{}", dest.display());
        let exists = dest.exists();

        if let (Some(limit), true) = (rate_limit, exists) {
            let last = self
                .state_get(&section, "last_requested")
                .and_then(|v| v.parse::<f64>().ok());
            if last.is_some_and(|last| now_secs() - last <= limit.as_secs_f64()) {
                debug!("skipping {url}: requested less than {limit:?} ago");
                return Ok(FetchOutcome::RateLimited);
            }
        }

        let mut request = self.client.get(url);
        if exists {
            if let Some(etag) = self.state_get(&section, "etag") {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(lm) = self.state_get(&section, "last_modified") {
                request = request.header(IF_MODIFIED_SINCE, lm);
            }
        }

        debug!("GET {url} (conditional)");
        let response = request
            .send()
            .and_then(reqwest::blocking::Response::error_for_status);
        let outcome = response.and_then(|resp| {
            let header = |name| {
                resp.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let etag = header(ETAG);
            let last_modified = header(LAST_MODIFIED);
            if resp.status() == StatusCode::NOT_MODIFIED {
                return Ok((etag, last_modified, None));
            }
            let body = resp.bytes()?;
            Ok((etag, last_modified, Some(body)))
        });

        match outcome {
            Ok((etag, last_modified, body)) => {
                let fetched = match body {
                    None => FetchOutcome::NotModified,
                    Some(body) => {
                        Self::write(dest, &body)?;
                        FetchOutcome::Downloaded
                    }
                };
                self.record(&section, etag.as_deref(), last_modified.as_deref());
                Ok(fetched)
            }
            Err(e) if exists => {
                warn!("using cached {}: {url}: {e}", dest.display());
                Ok(FetchOutcome::Stale)
            }
            Err(source) => Err(TransferError::Http {
                url: url.to_string(),
                source,
            }),
        }
    }

    fn post(&self, url: &str, body: Vec<u8>) -> Result<PostResponse, TransferError> {
        debug!("POST {url} ({} bytes)", body.len());
        let response = self
            .client
            .post(url)
            .body(body)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|source| TransferError::Http {
                url: url.to_string(),
                source,
            })?;
        Ok(PostResponse {
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::fs;
    use tempfile::tempdir;

    fn transfer(dir: &Path) -> HttpTransfer {
        HttpTransfer::new(dir.join("downloader.cfg"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn once_downloads_and_then_never_again() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/packages/1234.sdp")
            .with_body("sdp")
            .expect(1)
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("cache/1234.sdp");
        let http = transfer(dir.path());
        let url = format!("{}/packages/1234.sdp", server.url());

        http.fetch_once(&url, &dest).unwrap();
        http.fetch_once(&url, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"sdp");
        mock.assert();
    }

    #[test]
    fn once_propagates_http_errors() {
        let mut server = Server::new();
        server.mock("GET", "/missing.sdp").with_status(404).create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("missing.sdp");
        let err = transfer(dir.path())
            .fetch_once(&format!("{}/missing.sdp", server.url()), &dest)
            .unwrap_err();
        assert!(matches!(err, TransferError::Http { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn conditional_revalidates_with_etag() {
        let mut server = Server::new();
        let first = server
            .mock("GET", "/versions.gz")
            .match_header("if-none-match", Matcher::Missing)
            .with_header("etag", "\"v1\"")
            .with_body("v1")
            .expect(1)
            .create();
        let second = server
            .mock("GET", "/versions.gz")
            .match_header("if-none-match", "\"v1\"")
            .with_status(304)
            .expect(1)
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("versions.gz");
        let url = format!("{}/versions.gz", server.url());

        let http = transfer(dir.path());
        assert_eq!(
            http.fetch_conditional(&url, &dest, None).unwrap(),
            FetchOutcome::Downloaded
        );

        // State survives a new instance.
        let http = transfer(dir.path());
        assert_eq!(
            http.fetch_conditional(&url, &dest, None).unwrap(),
            FetchOutcome::NotModified
        );
        assert_eq!(fs::read(&dest).unwrap(), b"v1");

        first.assert();
        second.assert();
    }

    #[test]
    fn conditional_keeps_no_etag_for_unwritten_body() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/versions.gz")
            .match_header("if-none-match", Matcher::Missing)
            .with_header("etag", "\"v1\"")
            .with_body("v1")
            .expect(2)
            .create();

        let dir = tempdir().unwrap();
        let blocker = dir.path().join("ts1");
        fs::write(&blocker, b"not a directory").unwrap();
        let dest = blocker.join("versions.gz");
        let url = format!("{}/versions.gz", server.url());
        let http = transfer(dir.path());

        assert!(matches!(
            http.fetch_conditional(&url, &dest, None),
            Err(TransferError::Io { .. })
        ));
        let section = format!("{url},{}", dest.display());
        assert_eq!(http.state_get(&section, "etag"), None);

        fs::remove_file(&blocker).unwrap();
        assert_eq!(
            http.fetch_conditional(&url, &dest, None).unwrap(),
            FetchOutcome::Downloaded
        );
        assert_eq!(fs::read(&dest).unwrap(), b"v1");
        mock.assert();
    }

    #[test]
    fn conditional_respects_rate_limit() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/repos.gz")
            .with_body("list")
            .expect(1)
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("repos.gz");
        let url = format!("{}/repos.gz", server.url());
        let http = transfer(dir.path());
        let limit = Some(Duration::from_secs(3600));

        assert_eq!(
            http.fetch_conditional(&url, &dest, limit).unwrap(),
            FetchOutcome::Downloaded
        );
        assert_eq!(
            http.fetch_conditional(&url, &dest, limit).unwrap(),
            FetchOutcome::RateLimited
        );
        mock.assert();
    }

    #[test]
    fn conditional_falls_back_to_stale_copy() {
        let mut server = Server::new();
        server.mock("GET", "/repos.gz").with_status(500).create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("repos.gz");
        let url = format!("{}/repos.gz", server.url());
        let http = transfer(dir.path());

        assert!(http.fetch_conditional(&url, &dest, None).is_err());

        fs::write(&dest, b"old").unwrap();
        assert_eq!(
            http.fetch_conditional(&url, &dest, None).unwrap(),
            FetchOutcome::Stale
        );
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn post_streams_body_and_length() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/streamer.cgi?1234")
            .match_body("req")
            .with_body("frames")
            .create();

        let dir = tempdir().unwrap();
        let url = format!("{}/streamer.cgi?1234", server.url());
        let mut response = transfer(dir.path()).post(&url, b"req".to_vec()).unwrap();

        assert_eq!(response.content_length, Some(6));
        let mut body = String::new();
        response.body.read_to_string(&mut body).unwrap();
        assert_eq!(body, "frames");
        mock.assert();
    }
}
