//! Interned descriptors for files listed in package manifests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use rapid_schema::{FileEntry, Md5Digest};

/// A file of some package, stored in the pool under [`PoolFile::digest`].
///
/// Packages whose manifests list the same digest under the same name share
/// one descriptor; the same bytes under another name get their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolFile {
    /// Path of the file inside the package.
    pub name: String,
    /// MD5 of the uncompressed content.
    pub digest: Md5Digest,
    /// Published CRC32, informational.
    pub crc32: u32,
    /// Uncompressed size in bytes.
    pub size: u32,
}

impl From<FileEntry> for PoolFile {
    fn from(entry: FileEntry) -> Self {
        Self {
            name: entry.name,
            digest: entry.digest,
            crc32: entry.crc32,
            size: entry.size,
        }
    }
}

type Key = (Md5Digest, String);

/// Weak interning table for [`PoolFile`]s.
///
/// Entries die with the last package holding them; dead slots are swept
/// whenever the table doubles in size.
#[derive(Debug, Default)]
pub struct FileTable {
    inner: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<Key, Weak<PoolFile>>,
    sweep_at: usize,
}

impl FileTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared descriptor for `entry`, creating it if no live one
    /// exists.
    pub fn intern(&self, entry: FileEntry) -> Arc<PoolFile> {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (entry.digest, entry.name.clone());
        if let Some(live) = table.entries.get(&key).and_then(Weak::upgrade) {
            return live;
        }

        let file = Arc::new(PoolFile::from(entry));
        table.entries.insert(key, Arc::downgrade(&file));
        if table.entries.len() >= table.sweep_at {
            table.entries.retain(|_, weak| weak.strong_count() > 0);
            table.sweep_at = (table.entries.len() * 2).max(64);
        }
        file
    }

    /// Number of descriptors still referenced somewhere.
    pub fn live(&self) -> usize {
        let table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table
            .entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
