//! IO modules - side effects (network, filesystem)

pub mod memory;
pub mod transfer;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

pub use memory::MemoryTransfer;
pub use transfer::{FetchOutcome, HttpTransfer, PostResponse, Transfer, TransferError};

/// Replace `path` with `data` via a temporary file in the same directory.
///
/// The parent directory is created if needed. Readers see either the old
/// content or the new content, never a partial write.
///
/// # Errors
///
/// Propagates filesystem errors; `path` is left untouched on failure.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    atomic_write_with(path, |file| file.write_all(data))
}

/// Like [`atomic_write`], but lets `fill` stream into the temporary file.
///
/// # Errors
///
/// Propagates errors from `fill` and from the filesystem.
pub fn atomic_write_with<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Make `target` a hard link to `source`, falling back to a copy when the
/// filesystem refuses the link. Either way the two paths can be removed
/// independently.
///
/// # Errors
///
/// Fails if the copy fails as well.
pub fn link_or_copy(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::hard_link(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(_) => fs::copy(source, target).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/file.gz");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn failed_fill_keeps_old_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file");
        atomic_write(&path, b"old").unwrap();

        let err = atomic_write_with(&path, |f| {
            f.write_all(b"partial")?;
            Err(io::Error::other("interrupted"))
        });
        assert!(err.is_err());
        assert_eq!(fs::read(&path).unwrap(), b"old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn linked_files_are_independent() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.sdp");
        let target = dir.path().join("packages/a.sdp");
        fs::write(&source, b"manifest").unwrap();

        link_or_copy(&source, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"manifest");

        fs::remove_file(&target).unwrap();
        assert!(source.exists());
    }
}
