//! Runtime settings and the INI files kept in the content directory.

use std::io;
use std::path::Path;
use std::time::Duration;

use ini::{Ini, ParseOption};
use tracing::warn;

use crate::io::atomic_write;

/// Master repository list used when nothing else is configured.
pub const DEFAULT_MASTER_URL: &str = "http://repos.caspring.org/repos.gz";

/// Network timeout for every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum time between two conditional refreshes of the same file.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Environment variable overriding [`Settings::master_url`].
pub const MASTER_URL_ENV: &str = "RAPID_MASTER_URL";
/// Environment variable overriding [`Settings::timeout`], in seconds.
pub const TIMEOUT_ENV: &str = "RAPID_TIMEOUT_SECS";
/// Environment variable overriding [`Settings::refresh_interval`], in
/// seconds; `0` disables rate limiting.
pub const REFRESH_INTERVAL_ENV: &str = "RAPID_REFRESH_INTERVAL_SECS";

/// Knobs shared by the catalog and the HTTP transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// URL of the gzip-compressed repository list.
    pub master_url: String,
    /// Timeout applied to each HTTP request.
    pub timeout: Duration,
    /// Skip conditional refreshes of a file fetched less than this long ago.
    /// `None` always revalidates.
    pub refresh_interval: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_url: DEFAULT_MASTER_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            refresh_interval: Some(DEFAULT_REFRESH_INTERVAL),
        }
    }
}

impl Settings {
    /// Defaults overridden by `RAPID_*` environment variables.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(url) = lookup(MASTER_URL_ENV).filter(|u| !u.is_empty()) {
            settings.master_url = url;
        }
        if let Some(secs) = parse_secs(&lookup, TIMEOUT_ENV) {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, REFRESH_INTERVAL_ENV) {
            settings.refresh_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        settings
    }

    /// Builder-style helper replacing the master list URL.
    pub fn with_master_url(mut self, url: impl Into<String>) -> Self {
        self.master_url = url.into();
        self
    }

    /// Builder-style helper replacing the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!("ignoring {key}={raw}: not a number of seconds");
            None
        }
    }
}

/// Load an INI file without quote processing, so values such as ETags keep
/// their quotes. A missing file yields an empty document.
pub(crate) fn load_ini(path: &Path) -> Result<Ini, ini::Error> {
    if !path.exists() {
        return Ok(Ini::new());
    }
    Ini::load_from_file_opt(
        path,
        ParseOption {
            enabled_quote: false,
            ..ParseOption::default()
        },
    )
}

/// Atomically replace `path` with the serialised document.
pub(crate) fn save_ini(path: &Path, ini: &Ini) -> io::Result<()> {
    let mut buf = Vec::new();
    ini.write_to(&mut buf)?;
    atomic_write(path, &buf)
}
