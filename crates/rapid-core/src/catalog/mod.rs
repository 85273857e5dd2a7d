//! The package catalog.
//!
//! A [`Catalog`] is the handle every other component works through: it owns
//! the data directory layout, the transfer gateway, the pool and the lazily
//! loaded [`PackageGraph`]. Loading is all-or-nothing: a failed
//! [`Catalog::reload`] leaves the previous graph in place.

mod graph;
mod load;

use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, OnceLock};

use rapid_schema::sdp::decode_sdp;
use tracing::debug;

pub use graph::{Package, PackageGraph, PackageId, RepoId, TagRef};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::file::{FileTable, PoolFile};
use crate::io::Transfer;
use crate::paths::DataDir;
use crate::pool::Pool;

/// Repositories, packages and tags of one data directory.
pub struct Catalog {
    layout: DataDir,
    settings: Settings,
    transfer: Arc<dyn Transfer>,
    pool: Pool,
    files: FileTable,
    graph: OnceLock<PackageGraph>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("layout", &self.layout)
            .field("settings", &self.settings)
            .field("loaded", &self.graph.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Open the catalog of `layout`, creating its directories. Nothing is
    /// downloaded until the graph is first needed.
    ///
    /// # Errors
    ///
    /// Fails if the data directory cannot be created.
    pub fn open(layout: DataDir, settings: Settings, transfer: Arc<dyn Transfer>) -> Result<Self> {
        layout.ensure()?;
        Ok(Self {
            pool: Pool::new(layout.pool_dir()),
            layout,
            settings,
            transfer,
            files: FileTable::new(),
            graph: OnceLock::new(),
        })
    }

    /// Data directory layout.
    pub fn layout(&self) -> &DataDir {
        &self.layout
    }

    /// Active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Transfer gateway.
    pub fn transfer(&self) -> &dyn Transfer {
        self.transfer.as_ref()
    }

    /// Blob pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The package graph, loading it on first use.
    ///
    /// # Errors
    ///
    /// Propagates failures to fetch or parse the repository list or a
    /// repository's version manifest when no cached copy exists.
    pub fn graph(&self) -> Result<&PackageGraph> {
        if let Some(graph) = self.graph.get() {
            return Ok(graph);
        }
        let graph = load::load(&self.layout, &self.settings, self.transfer.as_ref())?;
        Ok(self.graph.get_or_init(|| graph))
    }

    /// True once the graph has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.graph.get().is_some()
    }

    /// Rebuild the graph from scratch.
    ///
    /// # Errors
    ///
    /// On failure the previous graph, if any, is kept.
    pub fn reload(&mut self) -> Result<&PackageGraph> {
        let graph = load::load(&self.layout, &self.settings, self.transfer.as_ref())?;
        self.graph = OnceLock::new();
        Ok(self.graph.get_or_init(|| graph))
    }

    /// Package `id` of the loaded graph.
    ///
    /// # Errors
    ///
    /// Fails if the graph cannot be loaded.
    pub fn package(&self, id: PackageId) -> Result<&Package> {
        Ok(self.graph()?.package(id))
    }

    /// Look up a package by name, then by tag.
    ///
    /// # Errors
    ///
    /// Fails if the graph cannot be loaded.
    pub fn find(&self, name_or_tag: &str) -> Result<Option<PackageId>> {
        Ok(self.graph()?.get(name_or_tag))
    }

    /// The files of package `id`, fetching its manifest if necessary.
    ///
    /// # Errors
    ///
    /// - [`Error::DetachedPackage`] if no repository provides the package.
    /// - [`Error::OfflineRepository`] if its repository is offline and the
    ///   manifest was never cached.
    /// - [`Error::Transfer`] if the manifest cannot be downloaded.
    /// - [`Error::PackageFormat`] if the manifest is malformed.
    pub fn files(&self, id: PackageId) -> Result<&[Arc<PoolFile>]> {
        let graph = self.graph()?;
        let package = graph.package(id);
        if let Some(files) = package.files.get() {
            return Ok(files.as_slice());
        }

        let repo = graph.repository_of(id).ok_or_else(|| Error::DetachedPackage {
            package: package.name().to_string(),
        })?;
        let sdp = repo.sdp_path(package.content_id());
        match repo.url() {
            Some(url) => {
                let remote = format!("{url}/packages/{}", package.content_id().sdp_file_name());
                self.transfer.fetch_once(&remote, &sdp)?;
            }
            None if !sdp.is_file() => {
                return Err(Error::OfflineRepository {
                    package: package.name().to_string(),
                    repository: repo.name().to_string(),
                });
            }
            None => {}
        }

        let entries = decode_sdp(BufReader::new(File::open(&sdp)?)).map_err(|source| {
            Error::PackageFormat {
                package: package.name().to_string(),
                source,
            }
        })?;
        debug!(package = package.name(), files = entries.len(), "read file manifest");
        let files = entries.into_iter().map(|e| self.files.intern(e)).collect();
        Ok(package.files.get_or_init(|| files).as_slice())
    }

    /// Files of `id` whose blob is not in the pool.
    ///
    /// # Errors
    ///
    /// See [`Catalog::files`].
    pub fn missing_files(&self, id: PackageId) -> Result<Vec<Arc<PoolFile>>> {
        Ok(self
            .files(id)?
            .iter()
            .filter(|f| !self.pool.contains(&f.digest))
            .cloned()
            .collect())
    }

    /// True if the manifest of `id` is in its repository's cache.
    ///
    /// # Errors
    ///
    /// Fails if the graph cannot be loaded.
    pub fn is_cached(&self, id: PackageId) -> Result<bool> {
        let graph = self.graph()?;
        Ok(graph
            .repository_of(id)
            .is_some_and(|repo| repo.sdp_path(graph.package(id).content_id()).is_file()))
    }

    /// True if `id` is visible to the engine.
    ///
    /// # Errors
    ///
    /// Fails if the graph cannot be loaded.
    pub fn is_installed(&self, id: PackageId) -> Result<bool> {
        let package = self.package(id)?;
        Ok(self.layout.installed_path(package.content_id()).exists())
    }

    /// Installed packages, in load order.
    ///
    /// # Errors
    ///
    /// Fails if the graph cannot be loaded.
    pub fn installed_packages(&self) -> Result<Vec<PackageId>> {
        self.partition(true)
    }

    /// Packages not installed, in load order.
    ///
    /// # Errors
    ///
    /// Fails if the graph cannot be loaded.
    pub fn not_installed_packages(&self) -> Result<Vec<PackageId>> {
        self.partition(false)
    }

    fn partition(&self, installed: bool) -> Result<Vec<PackageId>> {
        let graph = self.graph()?;
        Ok(graph
            .packages()
            .filter(|(_, p)| self.layout.installed_path(p.content_id()).exists() == installed)
            .map(|(id, _)| id)
            .collect())
    }

    /// Number of file descriptors still held by some package.
    pub fn live_files(&self) -> usize {
        self.files.live()
    }

    /// Package `id` and the base URL its files can be streamed from.
    pub(crate) fn fetch_source(&self, id: PackageId) -> Result<(&Package, &str)> {
        let graph = self.graph()?;
        let package = graph.package(id);
        let repo = graph.repository_of(id).ok_or_else(|| Error::DetachedPackage {
            package: package.name().to_string(),
        })?;
        let url = repo.url().ok_or_else(|| Error::OfflineRepository {
            package: package.name().to_string(),
            repository: repo.name().to_string(),
        })?;
        Ok((package, url))
    }
}
