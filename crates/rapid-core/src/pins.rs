//! Persisted set of pinned tags (`main.cfg`, section `[tags]`, key
//! `pinned`, comma separated).
//!
//! Every mutation is written back immediately. Other sections and keys in
//! the file are preserved.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::config::{load_ini, save_ini};

const SECTION: &str = "tags";
const KEY: &str = "pinned";

/// Pin store failures.
#[derive(Error, Debug)]
pub enum PinError {
    /// Removing a tag that is not pinned.
    #[error("tag '{0}' is not pinned")]
    NotPinned(String),

    /// The tag cannot be stored in a comma separated list.
    #[error("invalid tag '{0}'")]
    InvalidTag(String),

    /// The pin file is malformed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Pin file.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: ini::Error,
    },

    /// The pin file could not be written.
    #[error("failed to write pinned tags: {0}")]
    Io(#[from] io::Error),
}

/// The user's pinned tags: the root set of package collection.
#[derive(Debug)]
pub struct PinnedTags {
    path: PathBuf,
    ini: Ini,
    tags: BTreeSet<String>,
}

impl PinnedTags {
    /// Load the pin store at `path`; a missing file means no pins.
    ///
    /// # Errors
    ///
    /// Returns [`PinError::Read`] if the file exists but is malformed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PinError> {
        let path = path.into();
        let ini = load_ini(&path).map_err(|source| PinError::Read {
            path: path.clone(),
            source,
        })?;
        let tags = ini
            .section(Some(SECTION))
            .and_then(|s| s.get(KEY))
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { path, ini, tags })
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if `tag` is pinned.
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Pinned tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Number of pinned tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True if nothing is pinned.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Pin `tag`. Returns `false` if it was already pinned.
    ///
    /// # Errors
    ///
    /// Rejects tags containing commas or line breaks; propagates write
    /// errors.
    pub fn add(&mut self, tag: &str) -> Result<bool, PinError> {
        validate(tag)?;
        if !self.tags.insert(tag.to_string()) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Unpin `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`PinError::NotPinned`] if the tag was not pinned.
    pub fn remove(&mut self, tag: &str) -> Result<(), PinError> {
        if !self.tags.remove(tag) {
            return Err(PinError::NotPinned(tag.to_string()));
        }
        self.save()
    }

    /// Pin every tag in `tags`.
    ///
    /// # Errors
    ///
    /// Rejects the whole batch if any tag is invalid; propagates write
    /// errors.
    pub fn update<I, S>(&mut self, tags: I) -> Result<(), PinError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
        for tag in &tags {
            validate(tag)?;
        }
        self.tags.extend(tags);
        self.save()
    }

    /// Unpin everything.
    ///
    /// # Errors
    ///
    /// Propagates write errors.
    pub fn clear(&mut self) -> Result<(), PinError> {
        self.tags.clear();
        self.save()
    }

    fn save(&mut self) -> Result<(), PinError> {
        let joined = self.tags.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        self.ini.with_section(Some(SECTION)).set(KEY, joined);
        save_ini(&self.path, &self.ini)?;
        Ok(())
    }
}

fn validate(tag: &str) -> Result<(), PinError> {
    if tag.trim().is_empty() || tag.contains([',', '\n', '\r']) || tag.trim() != tag {
        return Err(PinError::InvalidTag(tag.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn store() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.cfg");
        (dir, path)
    }

    #[test]
    fn add_persists() {
        let (_dir, path) = store();
        PinnedTags::load(&path).unwrap().add("foo").unwrap();
        assert!(PinnedTags::load(&path).unwrap().contains("foo"));
    }

    #[test]
    fn add_duplicate_is_idempotent() {
        let (_dir, path) = store();
        let mut pins = PinnedTags::load(&path).unwrap();
        assert!(pins.add("foo").unwrap());
        assert!(!pins.add("foo").unwrap());
        let reloaded = PinnedTags::load(&path).unwrap();
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), ["foo"]);
    }

    #[test]
    fn clear_removes_all() {
        let (_dir, path) = store();
        let mut pins = PinnedTags::load(&path).unwrap();
        pins.update(["foo", "bar"]).unwrap();
        pins.clear().unwrap();
        assert!(PinnedTags::load(&path).unwrap().is_empty());
    }

    #[test]
    fn remove_persists() {
        let (_dir, path) = store();
        let mut pins = PinnedTags::load(&path).unwrap();
        pins.add("foo").unwrap();
        pins.remove("foo").unwrap();
        assert!(!PinnedTags::load(&path).unwrap().contains("foo"));
    }

    #[test]
    fn remove_missing_is_an_error() {
        let (_dir, path) = store();
        let mut pins = PinnedTags::load(&path).unwrap();
        assert!(matches!(pins.remove("foo"), Err(PinError::NotPinned(t)) if t == "foo"));
    }

    #[test]
    fn update_adds_all() {
        let (_dir, path) = store();
        let mut pins = PinnedTags::load(&path).unwrap();
        pins.update(["foo", "xta:latest"]).unwrap();
        let reloaded = PinnedTags::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("xta:latest"));
    }

    #[test]
    fn comma_in_tag_is_rejected() {
        let (_dir, path) = store();
        let mut pins = PinnedTags::load(&path).unwrap();
        assert!(matches!(pins.add("a,b"), Err(PinError::InvalidTag(_))));
        assert!(pins.is_empty());
    }

    #[test]
    fn reads_existing_file_and_keeps_other_keys() {
        let (_dir, path) = store();
        fs::write(&path, "[tags]\npinned = xta:latest,,s44:test\n[other]\nkey = value\n").unwrap();

        let mut pins = PinnedTags::load(&path).unwrap();
        assert_eq!(pins.iter().collect::<Vec<_>>(), ["s44:test", "xta:latest"]);

        pins.add("ba:stable").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("key=value") || text.contains("key = value"));
        assert!(text.contains("ba:stable,s44:test,xta:latest"));
    }
}
