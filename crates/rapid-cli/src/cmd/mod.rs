//! Verb implementations. Each takes the [`Session`] opened by `run`.

pub mod collect;
pub mod install;
pub mod list;
pub mod make_sdd;
pub mod pin;
pub mod upgrade;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rapid_core::{Catalog, DataDir, HttpTransfer, PackageGraph, PinnedTags, Settings};

use crate::select::{self, Matcher};
use crate::ui::Terminal;

/// Catalog, pins and terminal shared by all verbs of one invocation.
#[derive(Debug)]
pub struct Session {
    pub(crate) catalog: Catalog,
    pub(crate) pins: PinnedTags,
    pub(crate) terminal: Terminal,
    regex: bool,
}

impl Session {
    /// Open the data directory at `datadir` (or the default one) over HTTP.
    pub fn open(datadir: Option<&Path>, assume_yes: bool, regex: bool) -> Result<Self> {
        let layout = DataDir::resolve(datadir)
            .context("no data directory found, specify one with --datadir")?;
        let settings = Settings::from_env();
        let transfer = HttpTransfer::new(layout.transfer_state_file(), settings.timeout)
            .context("failed to set up HTTP client")?;
        Self::with_catalog(
            Catalog::open(layout, settings, Arc::new(transfer))
                .context("failed to prepare data directory")?,
            Terminal::new(assume_yes),
            regex,
        )
    }

    /// Wrap an already opened catalog.
    pub fn with_catalog(catalog: Catalog, terminal: Terminal, regex: bool) -> Result<Self> {
        let pins = PinnedTags::load(catalog.layout().pins_file())
            .context("failed to read pinned tags")?;
        Ok(Self {
            catalog,
            pins,
            terminal,
            regex,
        })
    }

    pub(crate) fn graph(&self) -> Result<&PackageGraph> {
        self.catalog
            .graph()
            .context("failed to load the package catalog")
    }

    pub(crate) fn matcher(&self, term: &str) -> Result<Matcher> {
        Matcher::new(term, self.regex).with_context(|| format!("invalid pattern '{term}'"))
    }

    /// Candidates matching `term`, asking the user to pick among several.
    pub(crate) fn select<I, S>(&self, noun: &str, term: &str, haystack: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = self.matcher(term)?;
        Ok(select::select(noun, term, &matcher, haystack, &self.terminal)?)
    }
}
