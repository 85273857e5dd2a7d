//! Arena-backed package graph.
//!
//! Packages and repositories live in vectors and refer to each other by
//! index, so dependency and reverse-dependency edges are plain ids.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use rapid_schema::{ContentId, PackageRecord};

use crate::file::PoolFile;
use crate::repository::Repository;

/// Index of a package within one loaded [`PackageGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(usize);

/// Index of a repository within one loaded [`PackageGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoId(pub(super) usize);

/// A package of the loaded catalog.
#[derive(Debug)]
pub struct Package {
    name: String,
    content_id: ContentId,
    tags: BTreeSet<String>,
    dependency_names: BTreeSet<String>,
    dependencies: BTreeSet<PackageId>,
    reverse_dependencies: BTreeSet<PackageId>,
    repository: Option<RepoId>,
    pub(super) files: OnceLock<Vec<Arc<PoolFile>>>,
}

impl Package {
    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the package's file manifest.
    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    /// Tags pointing at this package.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Dependency names as published, including ones that did not resolve.
    pub fn dependency_names(&self) -> &BTreeSet<String> {
        &self.dependency_names
    }

    /// Resolved direct dependencies.
    pub fn dependencies(&self) -> &BTreeSet<PackageId> {
        &self.dependencies
    }

    /// Packages that depend directly on this one.
    pub fn reverse_dependencies(&self) -> &BTreeSet<PackageId> {
        &self.reverse_dependencies
    }

    /// Owning repository; `None` for a detached package.
    pub fn repository(&self) -> Option<RepoId> {
        self.repository
    }

    /// True if no repository provides this package.
    pub fn is_detached(&self) -> bool {
        self.repository.is_none()
    }
}

/// What a tag points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRef {
    /// The package currently carrying the tag.
    Package(PackageId),
    /// No package carries the tag.
    Dangling,
}

impl TagRef {
    /// The package, if the tag is not dangling.
    pub fn package(self) -> Option<PackageId> {
        match self {
            Self::Package(id) => Some(id),
            Self::Dangling => None,
        }
    }
}

/// Repositories, packages and tags of one catalog load.
#[derive(Debug, Default)]
pub struct PackageGraph {
    repositories: Vec<Repository>,
    packages: Vec<Package>,
    by_name: HashMap<String, PackageId>,
    by_tag: BTreeMap<String, PackageId>,
}

impl PackageGraph {
    /// Build the graph from merged records.
    ///
    /// `records` must have unique names. Dependency names that match no
    /// record are dropped from the resolved edges; detached records are
    /// re-attached to the first repository whose cache already holds their
    /// file manifest.
    pub(crate) fn build(
        repositories: Vec<Repository>,
        records: Vec<(PackageRecord, Option<RepoId>)>,
    ) -> (Self, Vec<PackageId>) {
        let mut graph = Self {
            repositories,
            ..Self::default()
        };

        for (record, repository) in records {
            let id = PackageId(graph.packages.len());
            graph.by_name.insert(record.name.clone(), id);
            graph.packages.push(Package {
                name: record.name,
                content_id: record.content_id,
                tags: record.tags,
                dependency_names: record.dependencies,
                dependencies: BTreeSet::new(),
                reverse_dependencies: BTreeSet::new(),
                repository,
                files: OnceLock::new(),
            });
        }

        for index in 0..graph.packages.len() {
            let resolved: BTreeSet<PackageId> = graph.packages[index]
                .dependency_names
                .iter()
                .filter_map(|name| graph.by_name.get(name).copied())
                .collect();
            for dep in &resolved {
                graph.packages[dep.0]
                    .reverse_dependencies
                    .insert(PackageId(index));
            }
            graph.packages[index].dependencies = resolved;
        }

        let mut repaired = Vec::new();
        for (index, package) in graph.packages.iter_mut().enumerate() {
            if package.repository.is_some() {
                continue;
            }
            let holder = graph
                .repositories
                .iter()
                .position(|repo| repo.sdp_path(&package.content_id).is_file());
            if let Some(holder) = holder {
                package.repository = Some(RepoId(holder));
                repaired.push(PackageId(index));
            }
        }

        for (index, package) in graph.packages.iter().enumerate() {
            for tag in &package.tags {
                graph.by_tag.insert(tag.clone(), PackageId(index));
            }
        }

        (graph, repaired)
    }

    /// Number of packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// True if no package is known.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Access a package.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by another graph that is larger than this
    /// one.
    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    /// Access a repository.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by another, larger graph.
    pub fn repository(&self, id: RepoId) -> &Repository {
        &self.repositories[id.0]
    }

    /// Repository owning `id`, if any.
    pub fn repository_of(&self, id: PackageId) -> Option<&Repository> {
        self.package(id).repository.map(|r| self.repository(r))
    }

    /// All repositories, offline ones first.
    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// All package ids in load order.
    pub fn ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        (0..self.packages.len()).map(PackageId)
    }

    /// All packages with their ids, in load order.
    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.packages
            .iter()
            .enumerate()
            .map(|(i, p)| (PackageId(i), p))
    }

    /// Look up a package by name.
    pub fn by_name(&self, name: &str) -> Option<PackageId> {
        self.by_name.get(name).copied()
    }

    /// Look up a package by tag.
    pub fn by_tag(&self, tag: &str) -> Option<PackageId> {
        self.by_tag.get(tag).copied()
    }

    /// Look up by name first, then by tag.
    pub fn get(&self, name_or_tag: &str) -> Option<PackageId> {
        self.by_name(name_or_tag).or_else(|| self.by_tag(name_or_tag))
    }

    /// Resolve a tag, keeping dangling tags distinct.
    pub fn tag(&self, tag: &str) -> TagRef {
        self.by_tag(tag).map_or(TagRef::Dangling, TagRef::Package)
    }

    /// All tags with their package, sorted by tag.
    pub fn tags(&self) -> impl Iterator<Item = (&str, PackageId)> {
        self.by_tag.iter().map(|(tag, id)| (tag.as_str(), *id))
    }

    /// Names of `ids`, in the given order.
    pub fn names<'a, I>(&'a self, ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a PackageId>,
    {
        ids.into_iter()
            .map(|id| self.package(*id).name.clone())
            .collect()
    }
}
