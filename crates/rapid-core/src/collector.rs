//! Mark-and-sweep collection of unpinned packages and unreferenced blobs.
//!
//! Both collectors work in two steps: a plan (the dry run) and a sweep.
//! [`Collector::collect_packages`] and [`Collector::collect_pool`] combine
//! them with the confirmation flow of an [`Interaction`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader};

use rapid_schema::Md5Digest;
use rapid_schema::sdp::decode_sdp;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, PackageGraph, PackageId};
use crate::error::{DependencyError, Error, Result};
use crate::installer::Installer;
use crate::interaction::Interaction;
use crate::pins::PinnedTags;
use crate::pool::PoolBlob;

/// Installed packages no pinned tag needs, in uninstall order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagePlan {
    /// Dependents come before their dependencies.
    pub garbage: Vec<PackageId>,
}

impl PackagePlan {
    /// True if nothing would be uninstalled.
    pub fn is_empty(&self) -> bool {
        self.garbage.is_empty()
    }
}

/// Pool blobs no installed manifest references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolPlan {
    /// Blobs to delete, sorted by digest.
    pub garbage: Vec<PoolBlob>,
    /// Their total compressed size.
    pub bytes: u64,
}

impl PoolPlan {
    /// True if nothing would be deleted.
    pub fn is_empty(&self) -> bool {
        self.garbage.is_empty()
    }
}

/// Garbage collectors over one catalog.
#[derive(Debug, Clone, Copy)]
pub struct Collector<'c> {
    catalog: &'c Catalog,
}

impl<'c> Collector<'c> {
    /// Operate on `catalog`.
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// Installed packages outside the dependency closure of the pinned
    /// tags, ordered so each is uninstalled before its dependencies.
    ///
    /// # Errors
    ///
    /// [`DependencyError::Cycle`] if the garbage cannot be ordered.
    pub fn package_plan(&self, pins: &PinnedTags) -> Result<PackagePlan> {
        let graph = self.catalog.graph()?;

        let mut marked = HashSet::new();
        let mut stack: Vec<PackageId> = pins.iter().filter_map(|t| graph.by_tag(t)).collect();
        while let Some(id) = stack.pop() {
            if marked.insert(id) {
                stack.extend(graph.package(id).dependencies());
            }
        }

        let garbage: BTreeSet<PackageId> = self
            .catalog
            .installed_packages()?
            .into_iter()
            .filter(|id| !marked.contains(id))
            .collect();
        debug!(marked = marked.len(), garbage = garbage.len(), "marked pinned packages");

        Ok(PackagePlan {
            garbage: dependents_first(graph, &garbage)?,
        })
    }

    /// Uninstall the packages of `plan`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Stops at the first failing uninstall.
    pub fn sweep_packages(&self, plan: &PackagePlan) -> Result<usize> {
        let installer = Installer::new(self.catalog);
        for &id in &plan.garbage {
            installer.uninstall(id)?;
        }
        info!(packages = plan.garbage.len(), "uninstalled unpinned packages");
        Ok(plan.garbage.len())
    }

    /// Pool blobs not referenced by any manifest in `packages/`.
    ///
    /// Every installed manifest counts, including ones the catalog no
    /// longer knows about.
    ///
    /// # Errors
    ///
    /// [`Error::PackageFormat`] if an installed manifest cannot be read,
    /// since its blobs could not be told apart from garbage.
    pub fn pool_plan(&self) -> Result<PoolPlan> {
        let live = self.live_digests()?;
        let garbage: Vec<PoolBlob> = self
            .catalog
            .pool()
            .blobs()
            .into_iter()
            .filter(|blob| !live.contains(&blob.digest))
            .collect();
        let bytes: u64 = garbage.iter().map(|b| b.size).sum();
        debug!(live = live.len(), garbage = garbage.len(), bytes, "scanned pool");
        Ok(PoolPlan { garbage, bytes })
    }

    fn live_digests(&self) -> Result<HashSet<Md5Digest>> {
        let mut live = HashSet::new();
        let dir = self.catalog.layout().package_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(live),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "sdp") {
                continue;
            }
            let manifest = decode_sdp(BufReader::new(File::open(&path)?)).map_err(|source| {
                Error::PackageFormat {
                    package: path.display().to_string(),
                    source,
                }
            })?;
            live.extend(manifest.into_iter().map(|entry| entry.digest));
        }
        Ok(live)
    }

    /// Delete the blobs of `plan`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors; blobs already gone are skipped.
    pub fn sweep_pool(&self, plan: &PoolPlan) -> Result<usize> {
        let mut removed = 0;
        for blob in &plan.garbage {
            match fs::remove_file(&blob.path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!(path = %blob.path.display(), "blob already removed");
                }
                Err(err) => return Err(err.into()),
            }
        }
        info!(blobs = removed, bytes = plan.bytes, "collected pool");
        Ok(removed)
    }

    /// Plan, confirm and sweep unpinned packages. Returns how many were
    /// uninstalled.
    ///
    /// # Errors
    ///
    /// See [`Collector::package_plan`] and [`Collector::sweep_packages`].
    pub fn collect_packages(&self, pins: &PinnedTags, ui: &dyn Interaction) -> Result<usize> {
        let plan = self.package_plan(pins)?;
        if plan.is_empty() {
            info!("no unpinned packages installed");
            return Ok(0);
        }
        let graph = self.catalog.graph()?;
        let mut lines = vec![format!(
            "{} installed package(s) are not needed by any pinned tag:",
            plan.garbage.len()
        )];
        lines.extend(graph.names(&plan.garbage).into_iter().map(|n| format!("  {n}")));
        ui.important_warning(&lines);
        if !ui.confirm("Uninstall these packages?") {
            return Ok(0);
        }
        self.sweep_packages(&plan)
    }

    /// Plan, confirm twice and sweep unreferenced blobs. Returns how many
    /// were deleted.
    ///
    /// # Errors
    ///
    /// See [`Collector::pool_plan`] and [`Collector::sweep_pool`].
    pub fn collect_pool(&self, ui: &dyn Interaction) -> Result<usize> {
        let plan = self.pool_plan()?;
        if plan.is_empty() {
            info!("no unreferenced pool files");
            return Ok(0);
        }
        let question = format!(
            "Remove {} pool file(s) ({} bytes) not needed by any installed package?",
            plan.garbage.len(),
            plan.bytes
        );
        if !ui.confirm(&question) {
            return Ok(0);
        }
        ui.important_warning(&[
            "Pool files can not be recovered once deleted.".to_string(),
            "Packages that are not installed will have to download them again.".to_string(),
        ]);
        if !ui.confirm("Are you sure?") {
            return Ok(0);
        }
        self.sweep_pool(&plan)
    }
}

/// Order `set` so that every package precedes its dependencies within it.
fn dependents_first(graph: &PackageGraph, set: &BTreeSet<PackageId>) -> Result<Vec<PackageId>> {
    let mut dependents: BTreeMap<PackageId, usize> = set.iter().map(|&id| (id, 0)).collect();
    for &id in set {
        for dep in graph.package(id).dependencies() {
            if let Some(count) = dependents.get_mut(dep) {
                *count += 1;
            }
        }
    }

    let mut ready: Vec<PackageId> = dependents
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.reverse();

    let mut order = Vec::with_capacity(set.len());
    while let Some(id) = ready.pop() {
        order.push(id);
        for dep in graph.package(id).dependencies() {
            let Some(count) = dependents.get_mut(dep) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                ready.push(*dep);
            }
        }
    }

    if order.len() < set.len() {
        let remaining: BTreeSet<PackageId> = dependents
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(id, _)| id)
            .collect();
        return Err(DependencyError::Cycle {
            cycle: cycle_within(graph, &remaining),
        }
        .into());
    }
    Ok(order)
}

/// Names along one dependency cycle inside `remaining`, where every
/// package still has a dependent in the set.
fn cycle_within(graph: &PackageGraph, remaining: &BTreeSet<PackageId>) -> Vec<String> {
    let Some(&start) = remaining.iter().next() else {
        return Vec::new();
    };
    let mut walk = vec![start];
    let mut current = start;
    loop {
        let next = graph
            .package(current)
            .reverse_dependencies()
            .iter()
            .find(|r| remaining.contains(*r))
            .copied();
        let Some(next) = next else {
            break;
        };
        if let Some(pos) = walk.iter().position(|p| *p == next) {
            let mut cycle: Vec<PackageId> = walk[pos..].to_vec();
            cycle.push(next);
            cycle.reverse();
            return graph.names(&cycle);
        }
        walk.push(next);
        current = next;
    }
    graph.names(&walk)
}
