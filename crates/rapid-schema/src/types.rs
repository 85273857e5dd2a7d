//! Records shared by the text manifests and their parse errors.

use std::collections::BTreeSet;
use std::io;

use thiserror::Error;

use crate::hash::ContentId;

/// One package as described by a text manifest, before dependency names
/// are resolved against a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    /// Globally unique package name.
    pub name: String,
    /// Id of the package's file manifest.
    pub content_id: ContentId,
    /// Names of the packages this one depends on, as published.
    pub dependencies: BTreeSet<String>,
    /// Tags that currently point at this package.
    pub tags: BTreeSet<String>,
}

impl PackageRecord {
    /// Create a record without tags.
    pub fn new(
        name: impl Into<String>,
        content_id: ContentId,
        dependencies: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_id,
            dependencies: dependencies.into_iter().collect(),
            tags: BTreeSet::new(),
        }
    }

    /// Builder-style helper adding tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// True if `other` describes the same payload: same content id and the
    /// same dependency set.
    pub fn same_identity(&self, other: &PackageRecord) -> bool {
        self.content_id == other.content_id && self.dependencies == other.dependencies
    }
}

/// Errors raised while decoding the line-oriented text manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// A line has fewer comma-separated fields than the format requires.
    #[error("line {line}: expected {expected} comma-separated fields, found {found}")]
    FieldCount {
        /// 1-based line number.
        line: usize,
        /// Fields required by the format.
        expected: usize,
        /// Fields present.
        found: usize,
    },

    /// The content id column cannot name a manifest file.
    #[error("line {line}: invalid content id '{value}'")]
    ContentId {
        /// 1-based line number.
        line: usize,
        /// Offending value.
        value: String,
    },

    /// The underlying stream could not be read or decompressed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Split a pipe-separated value into its non-empty components.
pub fn split_psv(s: &str) -> impl Iterator<Item = &str> {
    s.split('|').filter(|x| !x.is_empty())
}

/// Split a manifest line into exactly `N` fields; the last field keeps any
/// remaining commas.
pub(crate) fn split_fields<const N: usize>(
    line: &str,
    line_no: usize,
) -> Result<[&str; N], ManifestError> {
    let mut out = [""; N];
    let mut found = 0;
    for (slot, field) in out.iter_mut().zip(line.splitn(N, ',')) {
        *slot = field;
        found += 1;
    }
    if found < N {
        return Err(ManifestError::FieldCount {
            line: line_no,
            expected: N,
            found,
        });
    }
    Ok(out)
}

/// Parse the content id column of a manifest line.
pub(crate) fn parse_content_id(value: &str, line_no: usize) -> Result<ContentId, ManifestError> {
    ContentId::new(value).map_err(|_| ManifestError::ContentId {
        line: line_no,
        value: value.to_string(),
    })
}

/// Iterate non-blank lines with their 1-based line numbers.
pub(crate) fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
}
