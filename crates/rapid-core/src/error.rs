//! Error taxonomy for catalog, pool and installer operations.

use std::io;
use std::path::PathBuf;

use rapid_schema::{ManifestError, PackageFormatError, StreamerFormatError};
use thiserror::Error;

use crate::io::TransferError;
use crate::pins::PinError;

/// Install/uninstall blocked by the shape of the dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// Some direct dependencies are not installed yet.
    #[error("cannot install '{package}': dependencies not installed: {}", missing.join(", "))]
    MissingDependencies {
        /// Package that was to be installed.
        package: String,
        /// Names of the direct dependencies that are missing.
        missing: Vec<String>,
    },

    /// Some reverse dependencies are still installed.
    #[error("cannot uninstall '{package}': required by installed packages: {}", dependents.join(", "))]
    InstalledDependents {
        /// Package that was to be uninstalled.
        package: String,
        /// Names of the installed packages depending on it.
        dependents: Vec<String>,
    },

    /// The dependency graph loops back on itself.
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    Cycle {
        /// Package names along the cycle; the first name is repeated last.
        cycle: Vec<String>,
    },
}

/// Errors surfaced by `rapid-core`.
#[derive(Error, Debug)]
pub enum Error {
    /// A download failed and no cached copy could stand in.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// A package's file manifest could not be read.
    #[error("package '{package}': malformed file manifest: {source}")]
    PackageFormat {
        /// Package name.
        package: String,
        /// Decoder error naming the truncated field.
        #[source]
        source: PackageFormatError,
    },

    /// A streamer response was rejected.
    #[error("package '{package}': bad streamer response in field '{}': {source}", source.field())]
    StreamerFormat {
        /// Package name.
        package: String,
        /// Decoder error naming the offending field.
        #[source]
        source: StreamerFormatError,
    },

    /// The package is only known from a repository that is no longer listed.
    #[error("package '{package}' can not be fetched: repository '{repository}' is offline")]
    OfflineRepository {
        /// Package name.
        package: String,
        /// Repository directory name.
        repository: String,
    },

    /// The package is not provided by any repository.
    #[error("package '{package}' can not be fetched: it is not provided by any repository")]
    DetachedPackage {
        /// Package name.
        package: String,
    },

    /// Install or uninstall blocked by the dependency graph.
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// A text manifest on disk is malformed.
    #[error("{}: {source}", path.display())]
    Manifest {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser error with line number.
        #[source]
        source: ManifestError,
    },

    /// A package file name would escape the extraction directory.
    #[error("package '{package}': refusing to extract unsafe path '{name}'")]
    UnsafePath {
        /// Package name.
        package: String,
        /// Offending file name from the manifest.
        name: String,
    },

    /// The pin store could not be read or written.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
