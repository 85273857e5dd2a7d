//! Data directory layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use rapid_schema::ContentId;

/// Environment variable overriding the default data directory.
pub const DATADIR_ENV: &str = "RAPID_DATADIR";

/// Returns the engine's default data directory, or None if the user's home
/// cannot be resolved.
pub fn try_default_data_dir() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os(DATADIR_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".spring"))
}

/// Layout of a writable engine data directory.
///
/// ```text
/// <root>/
/// ├── pool/<xx>/<30 hex>.gz     # content-addressed blobs
/// ├── packages/<id>.sdp         # installed manifests, visible to the engine
/// ├── mods/                     # extraction target for make-sdd
/// └── rapid/
///     ├── repos.gz, packages.gz
///     ├── main.cfg              # pinned tags
///     ├── downloader.cfg        # revalidation state
///     └── <host[:port]>/versions.gz, packages/<id>.sdp
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Wrap an existing or to-be-created data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `explicit` if given, otherwise [`try_default_data_dir`].
    pub fn resolve(explicit: Option<&Path>) -> Option<Self> {
        explicit
            .map(Path::to_path_buf)
            .or_else(try_default_data_dir)
            .map(Self::new)
    }

    /// Create the directories every operation expects.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [self.content_dir(), self.package_dir(), self.pool_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Data directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pool of compressed file blobs: `<root>/pool`
    pub fn pool_dir(&self) -> PathBuf {
        self.root.join("pool")
    }

    /// Installed manifests: `<root>/packages`
    pub fn package_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// Extraction target: `<root>/mods`
    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    /// Downloaded metadata: `<root>/rapid`
    pub fn content_dir(&self) -> PathBuf {
        self.root.join("rapid")
    }

    /// Cached master repository list.
    pub fn repos_gz(&self) -> PathBuf {
        self.content_dir().join("repos.gz")
    }

    /// Merged global manifest.
    pub fn packages_gz(&self) -> PathBuf {
        self.content_dir().join("packages.gz")
    }

    /// Pin store.
    pub fn pins_file(&self) -> PathBuf {
        self.content_dir().join("main.cfg")
    }

    /// HTTP revalidation state.
    pub fn transfer_state_file(&self) -> PathBuf {
        self.content_dir().join("downloader.cfg")
    }

    /// Cache directory of the repository named `name` (its host[:port]).
    pub fn repository_dir(&self, name: &str) -> PathBuf {
        self.content_dir().join(name)
    }

    /// Where an installed manifest is linked to.
    pub fn installed_path(&self, content_id: &ContentId) -> PathBuf {
        self.package_dir().join(content_id.sdp_file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_root() {
        let dir = DataDir::new("/data");
        let id = ContentId::new("1234").unwrap();
        assert_eq!(dir.pool_dir(), Path::new("/data/pool"));
        assert_eq!(dir.packages_gz(), Path::new("/data/rapid/packages.gz"));
        assert_eq!(dir.pins_file(), Path::new("/data/rapid/main.cfg"));
        assert_eq!(dir.repository_dir("ts1"), Path::new("/data/rapid/ts1"));
        assert_eq!(dir.installed_path(&id), Path::new("/data/packages/1234.sdp"));
    }

    #[test]
    fn explicit_dir_wins() {
        let dir = DataDir::resolve(Some(Path::new("/explicit"))).unwrap();
        assert_eq!(dir.root(), Path::new("/explicit"));
    }

    #[test]
    fn ensure_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::new(tmp.path().join("spring"));
        dir.ensure().unwrap();
        assert!(dir.pool_dir().is_dir());
        assert!(dir.package_dir().is_dir());
        assert!(dir.content_dir().is_dir());
    }
}
