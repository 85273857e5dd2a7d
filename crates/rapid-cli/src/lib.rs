//! rapid - package manager for Spring engine content
//!
//! Command line front end over `rapid-core`. Verbs taking search terms
//! (`pin`, `unpin`, `install`, `uninstall`) repeat for each term given.
#![allow(clippy::missing_errors_doc)]

pub mod cmd;
pub mod select;
pub mod ui;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cmd::Session;

const EXAMPLES: &str = "\
Examples:
  rapid pin xta:latest      # installs latest XTA
  rapid pin s44:latest      # installs latest Spring: 1944
  rapid upgrade             # upgrade all pinned tags

  rapid --regex list-tags ':(latest|stable|test)$'
    # all tags ending with ':latest', ':stable' or ':test'";

/// rapid - package manager for Spring engine content
#[derive(Debug, Parser)]
#[command(name = "rapid", author, version, long_about = None)]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    /// Override the default data directory (~/.spring)
    #[arg(long, global = true, env = rapid_core::paths::DATADIR_ENV)]
    pub datadir: Option<PathBuf>,

    /// Use regular expressions instead of substring matches
    #[arg(short, long, global = true)]
    pub regex: bool,

    /// Answer all confirmations with yes. MAY BE DANGEROUS!
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Verb to run
    #[command(subcommand)]
    pub command: Commands,
}

/// The verbs.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install the latest package for all pinned tags
    #[command(alias = "update")]
    Upgrade,
    /// Equivalent to 'upgrade' followed by 'uninstall-unpinned'
    #[command(alias = "clean-update")]
    CleanUpgrade,
    /// Pin tags and install the latest packages for them
    Pin {
        /// Tag search terms
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Unpin tags. Does not uninstall any packages
    Unpin {
        /// Pinned tag search terms
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Install packages. Does not pin any tags
    Install {
        /// Package name search terms
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Uninstall packages. Unpins their tags if any
    Uninstall {
        /// Installed package name search terms
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// List all tags matching the search term
    ListTags {
        /// Tag search term
        tag: Option<String>,
    },
    /// List pinned tags matching the search term
    ListPinnedTags {
        /// Tag search term
        tag: Option<String>,
    },
    /// List all packages whose name matches the search term
    ListPackages {
        /// Package name search term
        package: Option<String>,
    },
    /// List installed packages whose name matches the search term
    ListInstalledPackages {
        /// Package name search term
        package: Option<String>,
    },
    /// Keep only the pinned tags and all their dependencies
    UninstallUnpinned,
    /// Remove pool files not needed by any installed package
    CollectPool,
    /// Extract the files of a package into <datadir>/mods/<dir>
    MakeSdd {
        /// Package name or tag
        package: String,
        /// Directory name under mods/
        dir: String,
    },
}

/// Open the data directory and run the parsed command.
pub fn run(cli: Cli) -> Result<()> {
    let mut session = Session::open(cli.datadir.as_deref(), cli.yes, cli.regex)?;
    dispatch(&mut session, cli.command)
}

/// Run `command` against an open session.
pub fn dispatch(session: &mut Session, command: Commands) -> Result<()> {
    match command {
        Commands::Pin { tags } => each(&tags, |t| cmd::pin::pin(session, t)),
        Commands::Unpin { tags } => each(&tags, |t| cmd::pin::unpin(session, t)),
        Commands::Install { packages } => each(&packages, |p| cmd::install::install(session, p)),
        Commands::Uninstall { packages } => {
            each(&packages, |p| cmd::install::uninstall(session, p))
        }
        Commands::ListTags { tag } => {
            cmd::list::list_tags(session, tag.as_deref().unwrap_or_default(), true)
        }
        Commands::ListPinnedTags { tag } => {
            cmd::list::list_tags(session, tag.as_deref().unwrap_or_default(), false)
        }
        Commands::ListPackages { package } => {
            cmd::list::list_packages(session, package.as_deref().unwrap_or_default(), true)
        }
        Commands::ListInstalledPackages { package } => {
            cmd::list::list_packages(session, package.as_deref().unwrap_or_default(), false)
        }
        Commands::Upgrade => cmd::upgrade::upgrade(session),
        Commands::CleanUpgrade => cmd::upgrade::clean_upgrade(session),
        Commands::UninstallUnpinned => cmd::collect::uninstall_unpinned(session),
        Commands::CollectPool => cmd::collect::collect_pool(session),
        Commands::MakeSdd { package, dir } => cmd::make_sdd::make_sdd(session, &package, &dir),
    }
}

/// Apply `f` to every term, separating the output of consecutive terms.
fn each(terms: &[String], mut f: impl FnMut(&str) -> Result<()>) -> Result<()> {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        f(term)?;
    }
    Ok(())
}
