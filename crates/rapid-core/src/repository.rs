//! Package repositories and their on-disk caches.

use std::path::{Path, PathBuf};

use rapid_schema::ContentId;
use reqwest::Url;

use crate::paths::DataDir;

/// Whether a repository can still be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryKind {
    /// Listed by the master list this round.
    Online {
        /// Base URL, without a trailing slash.
        url: String,
    },
    /// Only a leftover cache directory remains.
    Offline,
}

/// A repository as seen from the local data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    name: String,
    kind: RepositoryKind,
    cache_dir: PathBuf,
}

impl Repository {
    /// A repository listed by the master list.
    pub fn online(url: &str, layout: &DataDir) -> Self {
        let url = url.trim_end_matches('/').to_string();
        let name = netloc(&url);
        Self {
            cache_dir: layout.repository_dir(&name),
            name,
            kind: RepositoryKind::Online { url },
        }
    }

    /// A repository known only from its cache directory `name`.
    pub fn offline(name: impl Into<String>, layout: &DataDir) -> Self {
        let name = name.into();
        Self {
            cache_dir: layout.repository_dir(&name),
            name,
            kind: RepositoryKind::Offline,
        }
    }

    /// Cache directory name: the URL's `host[:port]`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Online or offline.
    pub fn kind(&self) -> &RepositoryKind {
        &self.kind
    }

    /// Base URL, if the repository is online.
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            RepositoryKind::Online { url } => Some(url),
            RepositoryKind::Offline => None,
        }
    }

    /// True if files can be fetched from this repository.
    pub fn is_online(&self) -> bool {
        matches!(self.kind, RepositoryKind::Online { .. })
    }

    /// Root of this repository's cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cached version manifest.
    pub fn versions_path(&self) -> PathBuf {
        self.cache_dir.join("versions.gz")
    }

    /// Directory of cached file manifests.
    pub fn package_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("packages")
    }

    /// Cached file manifest of the package with `content_id`.
    pub fn sdp_path(&self, content_id: &ContentId) -> PathBuf {
        self.package_cache_dir().join(content_id.sdp_file_name())
    }
}

/// `host[:port]` of `url`, or the URL minus its scheme if it does not parse.
fn netloc(url: &str) -> String {
    let parsed = Url::parse(url).ok();
    if let Some((host, port)) = parsed.as_ref().and_then(|u| Some((u.host_str()?, u.port()))) {
        return match port {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
    }
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest).to_string()
}
