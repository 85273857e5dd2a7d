//! Content-addressed pool of gzip-compressed file blobs.
//!
//! Blobs are keyed by the MD5 of their *uncompressed* content and stored
//! still compressed at `pool/<hex[0..2]>/<hex[2..]>.gz`, giving 256 shard
//! directories created on demand. Integrity is checked when a blob is
//! received, not when it is stored.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use rapid_schema::Md5Digest;
use rapid_schema::compress::gunzip_reader;
use tracing::warn;

use crate::io::atomic_write;

/// A blob found on disk by [`Pool::blobs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolBlob {
    /// Key derived from the blob's path.
    pub digest: Md5Digest,
    /// Location on disk.
    pub path: PathBuf,
    /// Compressed size in bytes.
    pub size: u64,
}

/// Filesystem-backed blob store.
#[derive(Debug, Clone)]
pub struct Pool {
    root: PathBuf,
}

impl Pool {
    /// Open the pool rooted at `root`. Nothing is created until a blob is
    /// stored.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Pool root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path for a blob given its digest
    /// Uses 2-char prefix: ab/cdef0123....gz
    pub fn blob_path(&self, digest: &Md5Digest) -> PathBuf {
        let hex = digest.to_hex();
        let (shard, rest) = hex.split_at(2);
        self.root.join(shard).join(format!("{rest}.gz"))
    }

    /// Check if a blob is present.
    pub fn contains(&self, digest: &Md5Digest) -> bool {
        self.blob_path(digest).is_file()
    }

    /// Store compressed bytes under `digest`.
    ///
    /// Present blobs are never rewritten: a digest's content is immutable.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors. A failed write leaves no blob behind.
    pub fn put(&self, digest: &Md5Digest, compressed: &[u8]) -> io::Result<()> {
        if self.contains(digest) {
            return Ok(());
        }
        atomic_write(&self.blob_path(digest), compressed)
    }

    /// Open a blob for reading its *decompressed* content.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::NotFound`] if the blob is absent.
    pub fn open(&self, digest: &Md5Digest) -> io::Result<MultiGzDecoder<File>> {
        Ok(gunzip_reader(File::open(self.blob_path(digest))?))
    }

    /// Delete a blob.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors, including a missing blob.
    pub fn remove(&self, digest: &Md5Digest) -> io::Result<()> {
        fs::remove_file(self.blob_path(digest))
    }

    /// Scan every blob on disk. Files whose path is not a valid blob path
    /// (leftover temporaries, foreign files) are skipped.
    pub fn blobs(&self) -> Vec<PoolBlob> {
        let mut blobs = Vec::new();
        if !self.root.exists() {
            return blobs;
        }
        for entry in walkdir::WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "failed to walk pool");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(digest) = digest_from_path(entry.path()) else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            blobs.push(PoolBlob {
                digest,
                path: entry.into_path(),
                size,
            });
        }
        blobs.sort_by(|a, b| a.digest.cmp(&b.digest));
        blobs
    }
}

fn digest_from_path(path: &Path) -> Option<Md5Digest> {
    let stem = path.file_name()?.to_str()?.strip_suffix(".gz")?;
    let shard = path.parent()?.file_name()?.to_str()?;
    if shard.len() != 2 {
        return None;
    }
    Md5Digest::from_hex(&format!("{shard}{stem}")).ok()
}
