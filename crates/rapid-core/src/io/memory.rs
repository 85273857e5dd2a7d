//! In-memory [`Transfer`] serving a URL→bytes table.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::atomic_write;
use super::transfer::{FetchOutcome, PostResponse, Transfer, TransferError};

#[derive(Debug, Default)]
struct State {
    www: HashMap<String, Vec<u8>>,
    served: HashMap<(String, PathBuf), (Instant, Vec<u8>)>,
    requests: usize,
    omit_length: bool,
}

/// Serves a fixed table of URLs without touching the network.
///
/// Conditional fetches answer "not modified" when the served bytes have not
/// changed since the last fetch into the same file; a URL missing from the
/// table behaves like an unreachable server.
#[derive(Debug, Default)]
pub struct MemoryTransfer {
    state: Mutex<State>,
}

impl MemoryTransfer {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `body` at `url`, replacing any previous body.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.lock().www.insert(url.into(), body.into());
    }

    /// Stop serving `url`.
    pub fn remove(&self, url: &str) {
        self.lock().www.remove(url);
    }

    /// Number of requests that reached the table.
    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    /// Answer POST requests without a total length.
    pub fn omit_content_length(&self, omit: bool) {
        self.lock().omit_length = omit;
    }

    fn serve(state: &mut State, url: &str) -> Result<Vec<u8>, TransferError> {
        state.requests += 1;
        state
            .www
            .get(url)
            .cloned()
            .ok_or_else(|| TransferError::NotFound {
                url: url.to_string(),
            })
    }
}

fn write(dest: &Path, data: &[u8]) -> Result<(), TransferError> {
    atomic_write(dest, data).map_err(|source| TransferError::Io {
        path: dest.to_path_buf(),
        source,
    })
}

impl Transfer for MemoryTransfer {
    fn fetch_once(&self, url: &str, dest: &Path) -> Result<(), TransferError> {
        if dest.exists() {
            return Ok(());
        }
        let body = Self::serve(&mut self.lock(), url)?;
        write(dest, &body)
    }

    fn fetch_conditional(
        &self,
        url: &str,
        dest: &Path,
        rate_limit: Option<Duration>,
    ) -> Result<FetchOutcome, TransferError> {
        let mut state = self.lock();
        let key = (url.to_string(), dest.to_path_buf());
        let exists = dest.exists();

        let recent = match (rate_limit, state.served.get(&key)) {
            (Some(limit), Some((at, _))) => at.elapsed() <= limit,
            _ => false,
        };
        if recent && exists {
            return Ok(FetchOutcome::RateLimited);
        }

        let body = match Self::serve(&mut state, url) {
            Ok(body) => body,
            Err(_) if exists => return Ok(FetchOutcome::Stale),
            Err(e) => return Err(e),
        };

        let unchanged = state.served.get(&key).is_some_and(|(_, last)| *last == body);
        state.served.insert(key, (Instant::now(), body.clone()));
        if unchanged && exists {
            return Ok(FetchOutcome::NotModified);
        }
        write(dest, &body)?;
        Ok(FetchOutcome::Downloaded)
    }

    fn post(&self, url: &str, _body: Vec<u8>) -> Result<PostResponse, TransferError> {
        let mut state = self.lock();
        let body = Self::serve(&mut state, url)?;
        let content_length = (!state.omit_length).then_some(body.len() as u64);
        Ok(PostResponse {
            content_length,
            body: Box::new(Cursor::new(body)),
        })
    }
}
