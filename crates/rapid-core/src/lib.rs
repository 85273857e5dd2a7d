//! Catalog, pool, installer and collectors for rapid content packages.
//!
//! Everything works through a [`Catalog`] opened on a [`DataDir`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use rapid_core::{Catalog, DataDir, HttpTransfer, Installer, NullProgress, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = DataDir::new("/home/user/.spring");
//! let settings = Settings::from_env();
//! let transfer = HttpTransfer::new(layout.transfer_state_file(), settings.timeout)?;
//! let catalog = Catalog::open(layout, settings, Arc::new(transfer))?;
//!
//! if let Some(id) = catalog.find("xta:latest")? {
//!     Installer::new(&catalog).install_closure(id, &NullProgress)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod collector;
pub mod config;
pub mod error;
pub mod file;
pub mod installer;
pub mod interaction;
pub mod io;
pub mod paths;
pub mod pins;
pub mod pool;
pub mod progress;
pub mod repository;

pub use catalog::{Catalog, Package, PackageGraph, PackageId, RepoId, TagRef};
pub use collector::{Collector, PackagePlan, PoolPlan};
pub use config::Settings;
pub use error::{DependencyError, Error, Result};
pub use file::{FileTable, PoolFile};
pub use installer::{Installer, UpgradeReport};
pub use interaction::{FixedAnswer, Interaction};
pub use io::{FetchOutcome, HttpTransfer, MemoryTransfer, Transfer, TransferError};
pub use paths::DataDir;
pub use pins::{PinError, PinnedTags};
pub use pool::{Pool, PoolBlob};
pub use progress::{NullProgress, Progress, ProgressCounter};
pub use repository::{Repository, RepositoryKind};

/// User Agent string sent with every request.
pub const USER_AGENT: &str = concat!("rapid/", env!("CARGO_PKG_VERSION"));
