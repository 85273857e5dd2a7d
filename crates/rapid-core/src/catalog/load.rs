//! Catalog loading: refresh manifests, overlay them on the merged cache,
//! persist the result and build the graph.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use rapid_schema::packages::{read_packages, write_packages};
use rapid_schema::repos::read_repository_list;
use rapid_schema::versions::read_versions;
use rapid_schema::{ManifestError, PackageRecord};
use tracing::{debug, info, warn};

use super::graph::{PackageGraph, RepoId};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::io::{Transfer, atomic_write_with};
use crate::paths::DataDir;
use crate::repository::Repository;

/// Working set of records keyed by package name, in first-seen order.
#[derive(Debug, Default)]
struct Overlay {
    entries: Vec<(PackageRecord, Option<RepoId>)>,
    by_name: HashMap<String, usize>,
    live: HashSet<usize>,
}

impl Overlay {
    fn insert(&mut self, record: PackageRecord, repository: Option<RepoId>) -> usize {
        match self.by_name.get(&record.name) {
            Some(&index) => {
                self.entries[index] = (record, repository);
                index
            }
            None => {
                let index = self.entries.len();
                self.by_name.insert(record.name.clone(), index);
                self.entries.push((record, repository));
                index
            }
        }
    }

    fn confirm(&mut self, record: PackageRecord, repository: RepoId) {
        let index = self.insert(record, Some(repository));
        self.live.insert(index);
    }

    /// Tags claimed by a repository this round move off cache-only records.
    fn strip_unconfirmed_tags(&mut self) {
        let claimed: BTreeSet<String> = self
            .live
            .iter()
            .flat_map(|&i| self.entries[i].0.tags.iter().cloned())
            .collect();
        for (index, (record, _)) in self.entries.iter_mut().enumerate() {
            if self.live.contains(&index) {
                continue;
            }
            let before = record.tags.len();
            record.tags.retain(|tag| !claimed.contains(tag));
            if record.tags.len() != before {
                debug!(package = %record.name, "dropped tags now owned by another package");
            }
        }
    }
}

pub(super) fn load(
    layout: &DataDir,
    settings: &Settings,
    transfer: &dyn Transfer,
) -> Result<PackageGraph> {
    let repositories = discover_repositories(layout, settings, transfer)?;

    let mut overlay = Overlay::default();
    for record in read_cached_packages(&layout.packages_gz()) {
        overlay.insert(record, None);
    }

    for (index, repo) in repositories.iter().enumerate() {
        let versions = repo.versions_path();
        if let Some(url) = repo.url() {
            match transfer.fetch_conditional(
                &format!("{url}/versions.gz"),
                &versions,
                settings.refresh_interval,
            ) {
                Ok(outcome) => {
                    debug!(repository = repo.name(), ?outcome, "refreshed version manifest");
                }
                Err(err) => {
                    warn!(repository = repo.name(), %err, "skipping unreachable repository");
                    continue;
                }
            }
        }
        let manifest = read_versions(open(&versions)?).map_err(|source| Error::Manifest {
            path: versions.clone(),
            source,
        })?;
        for conflict in &manifest.conflicts {
            warn!(
                repository = repo.name(),
                line = conflict.line,
                package = %conflict.name,
                content_id = %conflict.content_id,
                "ignoring conflicting entry for package"
            );
        }
        for malformed in &manifest.malformed {
            warn!(
                repository = repo.name(),
                line = malformed.line,
                reason = %malformed.reason,
                "ignoring malformed line in version manifest"
            );
        }
        for record in manifest.packages {
            overlay.confirm(record, RepoId(index));
        }
    }

    overlay.strip_unconfirmed_tags();

    let packages_gz = layout.packages_gz();
    atomic_write_with(&packages_gz, |file| {
        write_packages(file, overlay.entries.iter().map(|(record, _)| record)).map(drop)
    })?;

    let (graph, repaired) = PackageGraph::build(repositories, overlay.entries);
    for id in repaired {
        let package = graph.package(id);
        info!(
            package = package.name(),
            repository = graph.repository_of(id).map(Repository::name),
            "re-attached package to a repository holding its manifest"
        );
    }
    debug!(
        packages = graph.len(),
        repositories = graph.repositories().len(),
        "catalog loaded"
    );
    Ok(graph)
}

/// Online repositories in master list order, preceded by offline ones
/// found as leftover cache directories with a version manifest.
fn discover_repositories(
    layout: &DataDir,
    settings: &Settings,
    transfer: &dyn Transfer,
) -> Result<Vec<Repository>> {
    let repos_gz = layout.repos_gz();
    let outcome = transfer.fetch_conditional(
        &settings.master_url,
        &repos_gz,
        settings.refresh_interval,
    )?;
    debug!(?outcome, "refreshed repository list");

    let urls = read_repository_list(open(&repos_gz)?).map_err(|source| Error::Manifest {
        path: repos_gz.clone(),
        source,
    })?;
    let mut online: Vec<Repository> = Vec::new();
    let mut names = HashSet::new();
    for url in &urls {
        let repo = Repository::online(url, layout);
        if names.insert(repo.name().to_string()) {
            online.push(repo);
        } else {
            warn!(%url, repository = repo.name(), "ignoring repository with a duplicate name");
        }
    }

    let mut offline = Vec::new();
    for entry in fs::read_dir(layout.content_dir())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if names.contains(&name) {
            continue;
        }
        let repo = Repository::offline(name, layout);
        if repo.versions_path().is_file() {
            debug!(repository = repo.name(), "repository is offline");
            offline.push(repo);
        }
    }
    offline.sort_by(|a, b| a.name().cmp(b.name()));

    offline.extend(online);
    Ok(offline)
}

/// Previously merged records, or nothing if the cache is absent or broken.
fn read_cached_packages(path: &Path) -> Vec<PackageRecord> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), %err, "cannot read package cache");
            return Vec::new();
        }
    };
    match read_packages(BufReader::new(file)) {
        Ok(records) => records,
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring malformed package cache");
            Vec::new()
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| Error::Manifest {
            path: path.to_path_buf(),
            source: ManifestError::Io(source),
        })
}
