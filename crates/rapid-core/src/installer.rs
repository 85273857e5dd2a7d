//! Moving packages between available and installed.
//!
//! A package is installed when its file manifest is linked into
//! `packages/`, where the engine picks it up. Installation first streams
//! every missing file into the pool; uninstalling only removes the link.
//! Pool blobs are reclaimed by the collector, never here.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use rapid_schema::Md5Digest;
use rapid_schema::streamer::{FrameReader, StreamerFormatError, encode_request};
use tracing::{debug, info};

use crate::catalog::{Catalog, PackageId, TagRef};
use crate::error::{DependencyError, Error, Result};
use crate::file::PoolFile;
use crate::io::{atomic_write_with, link_or_copy};
use crate::pins::PinnedTags;
use crate::progress::Progress;

/// Outcome of [`Installer::upgrade`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Packages installed by this upgrade, dependencies first.
    pub installed: Vec<PackageId>,
    /// Pinned tags that no package carries.
    pub dangling: Vec<String>,
}

/// Install and uninstall operations over a loaded catalog.
#[derive(Debug, Clone, Copy)]
pub struct Installer<'c> {
    catalog: &'c Catalog,
}

enum Visit {
    Enter(PackageId),
    Exit(PackageId),
}

impl<'c> Installer<'c> {
    /// Operate on `catalog`.
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// True if `id` is linked into the engine's package directory.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be loaded.
    pub fn is_installed(&self, id: PackageId) -> Result<bool> {
        self.catalog.is_installed(id)
    }

    /// True if `id` is installed or all its direct dependencies are.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be loaded.
    pub fn can_be_installed(&self, id: PackageId) -> Result<bool> {
        if self.is_installed(id)? {
            return Ok(true);
        }
        Ok(self.missing_dependencies(id)?.is_empty())
    }

    fn missing_dependencies(&self, id: PackageId) -> Result<Vec<PackageId>> {
        let mut missing = Vec::new();
        for &dep in self.catalog.package(id)?.dependencies() {
            if !self.is_installed(dep)? {
                missing.push(dep);
            }
        }
        Ok(missing)
    }

    fn installed_dependents(&self, id: PackageId) -> Result<Vec<PackageId>> {
        let mut dependents = Vec::new();
        for &rdep in self.catalog.package(id)?.reverse_dependencies() {
            if self.is_installed(rdep)? {
                dependents.push(rdep);
            }
        }
        Ok(dependents)
    }

    /// Install `id`, streaming its missing files into the pool.
    ///
    /// Does nothing if the package is already installed. `progress` receives
    /// the response size as its maximum and ends at that maximum.
    ///
    /// # Errors
    ///
    /// - [`DependencyError::MissingDependencies`] if a direct dependency is
    ///   not installed; nothing is changed.
    /// - [`Error::DetachedPackage`] or [`Error::OfflineRepository`] if the
    ///   files cannot be fetched.
    /// - [`Error::StreamerFormat`] if the download is rejected; blobs
    ///   verified before the failure stay in the pool.
    pub fn install(&self, id: PackageId, progress: &dyn Progress) -> Result<()> {
        let graph = self.catalog.graph()?;
        let package = graph.package(id);
        if self.is_installed(id)? {
            debug!(package = package.name(), "already installed");
            return Ok(());
        }

        let missing = self.missing_dependencies(id)?;
        if !missing.is_empty() {
            return Err(DependencyError::MissingDependencies {
                package: package.name().to_string(),
                missing: graph.names(&missing),
            }
            .into());
        }

        let files = self.catalog.missing_files(id)?;
        let reported = self.download(id, &files, progress)?;

        let repo = graph.repository_of(id).ok_or_else(|| Error::DetachedPackage {
            package: package.name().to_string(),
        })?;
        let installed = self.catalog.layout().installed_path(package.content_id());
        link_or_copy(&repo.sdp_path(package.content_id()), &installed)?;
        progress.advance(progress.maximum().saturating_sub(reported));
        info!(package = package.name(), files = files.len(), "installed");
        Ok(())
    }

    /// Stream `files` of `id` into the pool. Returns the bytes reported to
    /// `progress`.
    fn download(
        &self,
        id: PackageId,
        files: &[Arc<PoolFile>],
        progress: &dyn Progress,
    ) -> Result<u64> {
        if files.is_empty() {
            progress.set_maximum(0);
            return Ok(0);
        }
        let (package, url) = self.catalog.fetch_source(id)?;
        let streamer_error = |source: StreamerFormatError| Error::StreamerFormat {
            package: package.name().to_string(),
            source,
        };

        let wanted: HashSet<Md5Digest> = files.iter().map(|f| f.digest).collect();
        let manifest = self.catalog.files(id)?;
        let selection: Vec<bool> = manifest.iter().map(|f| wanted.contains(&f.digest)).collect();
        let expected: Vec<Md5Digest> = manifest
            .iter()
            .zip(&selection)
            .filter(|(_, selected)| **selected)
            .map(|(f, _)| f.digest)
            .collect();

        let response = self.catalog.transfer().post(
            &format!("{url}/streamer.cgi?{}", package.content_id()),
            encode_request(selection)?,
        )?;
        let total = response
            .content_length
            .ok_or_else(|| streamer_error(StreamerFormatError::MissingLength))?;
        progress.set_maximum(total);
        progress.advance(0);

        let pool = self.catalog.pool();
        let mut reported = 0;
        for frame in FrameReader::new(BufReader::new(response.body), &expected) {
            let frame = frame.map_err(streamer_error)?;
            pool.put(&frame.digest, &frame.data)?;
            let bytes = 4 + frame.data.len() as u64;
            progress.advance(bytes);
            reported += bytes;
        }
        debug!(package = package.name(), files = expected.len(), bytes = reported, "downloaded");
        Ok(reported)
    }

    /// True if `id` is not installed or none of its reverse dependencies is.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be loaded.
    pub fn can_be_uninstalled(&self, id: PackageId) -> Result<bool> {
        if !self.is_installed(id)? {
            return Ok(true);
        }
        Ok(self.installed_dependents(id)?.is_empty())
    }

    /// Remove `id` from the engine's package directory.
    ///
    /// # Errors
    ///
    /// [`DependencyError::InstalledDependents`] if an installed package
    /// still depends on it; nothing is changed.
    pub fn uninstall(&self, id: PackageId) -> Result<()> {
        let graph = self.catalog.graph()?;
        let package = graph.package(id);
        if !self.is_installed(id)? {
            debug!(package = package.name(), "not installed");
            return Ok(());
        }
        let dependents = self.installed_dependents(id)?;
        if !dependents.is_empty() {
            return Err(DependencyError::InstalledDependents {
                package: package.name().to_string(),
                dependents: graph.names(&dependents),
            }
            .into());
        }
        fs::remove_file(self.catalog.layout().installed_path(package.content_id()))?;
        info!(package = package.name(), "uninstalled");
        Ok(())
    }

    /// Predict whether installing `id` with its dependencies can succeed
    /// without a repository being unreachable.
    ///
    /// Each package in the closure must be installed already, belong to an
    /// online repository, or have its manifest and all files available
    /// locally.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be loaded or a cached manifest cannot be
    /// read.
    pub fn installable(&self, id: PackageId) -> Result<bool> {
        let graph = self.catalog.graph()?;
        let mut queue = VecDeque::from([id]);
        let mut seen = HashSet::new();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) || self.is_installed(next)? {
                continue;
            }
            let available = match graph.repository_of(next) {
                None => false,
                Some(repo) if repo.is_online() => true,
                Some(_) => {
                    self.catalog.is_cached(next)? && self.catalog.missing_files(next)?.is_empty()
                }
            };
            if !available {
                debug!(package = graph.package(next).name(), "not installable");
                return Ok(false);
            }
            queue.extend(graph.package(next).dependencies());
        }
        Ok(true)
    }

    /// The dependency closure of `id`, dependencies before dependents,
    /// ending with `id`.
    ///
    /// # Errors
    ///
    /// [`DependencyError::Cycle`] if the closure contains a cycle.
    pub fn plan(&self, id: PackageId) -> Result<Vec<PackageId>> {
        let graph = self.catalog.graph()?;
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut path: Vec<PackageId> = Vec::new();
        let mut stack = vec![Visit::Enter(id)];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(next) => {
                    if done.contains(&next) {
                        continue;
                    }
                    if let Some(start) = path.iter().position(|p| *p == next) {
                        let mut cycle = graph.names(&path[start..]);
                        cycle.push(graph.package(next).name().to_string());
                        return Err(DependencyError::Cycle { cycle }.into());
                    }
                    path.push(next);
                    stack.push(Visit::Exit(next));
                    for dep in graph.package(next).dependencies().iter().rev() {
                        if !done.contains(dep) {
                            stack.push(Visit::Enter(*dep));
                        }
                    }
                }
                Visit::Exit(next) => {
                    path.pop();
                    done.insert(next);
                    order.push(next);
                }
            }
        }
        Ok(order)
    }

    /// Install `id` and every dependency not installed yet. Returns the
    /// packages installed, in installation order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing package; packages installed before it
    /// stay installed.
    pub fn install_closure(&self, id: PackageId, progress: &dyn Progress) -> Result<Vec<PackageId>> {
        let mut installed = Vec::new();
        for next in self.plan(id)? {
            if self.is_installed(next)? {
                continue;
            }
            self.install(next, progress)?;
            installed.push(next);
        }
        Ok(installed)
    }

    /// Install the current package of every pinned tag.
    ///
    /// # Errors
    ///
    /// Stops at the first failing install.
    pub fn upgrade(&self, pins: &PinnedTags, progress: &dyn Progress) -> Result<UpgradeReport> {
        let graph = self.catalog.graph()?;
        let mut report = UpgradeReport::default();
        for tag in pins.iter() {
            match graph.tag(tag) {
                TagRef::Package(id) => report.installed.extend(self.install_closure(id, progress)?),
                TagRef::Dangling => report.dangling.push(tag.to_string()),
            }
        }
        Ok(report)
    }

    /// Write the decompressed files of `id` to `mods/<dir>/`, downloading
    /// missing ones first. Returns the target directory.
    ///
    /// # Errors
    ///
    /// [`Error::UnsafePath`] if `dir` or a file name is absolute or climbs
    /// out of the target; nothing is written in that case.
    pub fn extract(&self, id: PackageId, dir: &str, progress: &dyn Progress) -> Result<PathBuf> {
        let package = self.catalog.package(id)?;
        let unsafe_path = |name: &str| Error::UnsafePath {
            package: package.name().to_string(),
            name: name.to_string(),
        };
        let dir = relative(dir).ok_or_else(|| unsafe_path(dir))?;
        let files = self.catalog.files(id)?;
        let mut targets = Vec::with_capacity(files.len());
        for file in files {
            targets.push(relative(&file.name).ok_or_else(|| unsafe_path(&file.name))?);
        }

        let missing = self.catalog.missing_files(id)?;
        self.download(id, &missing, progress)?;

        let root = self.catalog.layout().mods_dir().join(dir);
        let pool = self.catalog.pool();
        for (file, target) in files.iter().zip(targets) {
            let mut blob = pool.open(&file.digest)?;
            atomic_write_with(&root.join(target), |out| io::copy(&mut blob, out).map(drop))?;
        }
        info!(package = package.name(), files = files.len(), dir = %root.display(), "extracted");
        Ok(root)
    }
}

/// `name` as a path that stays below the directory it is joined to.
fn relative(name: &str) -> Option<&Path> {
    let path = Path::new(name);
    let normal = path.components().all(|c| matches!(c, Component::Normal(_)));
    (!name.is_empty() && normal).then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_rejects_escapes() {
        assert!(relative("maps/a.smf").is_some());
        assert!(relative("../etc/passwd").is_none());
        assert!(relative("a/../../b").is_none());
        assert!(relative("/abs").is_none());
        assert!(relative("").is_none());
    }
}
