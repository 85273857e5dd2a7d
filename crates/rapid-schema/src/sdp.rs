//! Package file manifest (`<content_id>.sdp`).
//!
//! After gzip decompression the manifest is a sequence of records:
//!
//! ```text
//! u8 name_len | name | 16B md5 | 4B crc32 | u32be size
//! ```
//!
//! End of stream where a length byte is expected terminates normally.

use std::fmt;
use std::io::{self, Read, Write};

use thiserror::Error;

use crate::compress::{gunzip_reader, gzip, read_full};
use crate::hash::Md5Digest;

/// One file listed in a package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    /// Path of the file inside the package.
    pub name: String,
    /// MD5 of the uncompressed content; also the pool key.
    pub digest: Md5Digest,
    /// CRC32 as published. Informational only, never checked.
    pub crc32: u32,
    /// Uncompressed size in bytes.
    pub size: u32,
}

/// The record field a truncated manifest stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpField {
    /// File name bytes.
    Name,
    /// 16 byte content digest.
    Md5,
    /// 4 byte checksum.
    Crc32,
    /// 4 byte big-endian size.
    Size,
}

impl SdpField {
    /// Field name as reported in errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Md5 => "md5",
            Self::Crc32 => "crc32",
            Self::Size => "size",
        }
    }
}

impl fmt::Display for SdpField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package manifest that cannot be read.
#[derive(Error, Debug)]
pub enum PackageFormatError {
    /// The stream ended inside record `index`.
    #[error("truncated record {index}: short read in field '{field}'")]
    Truncated {
        /// Field that could not be read completely.
        field: SdpField,
        /// 0-based record index.
        index: usize,
    },

    /// The stream could not be read or decompressed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PackageFormatError {
    /// The truncated field, if this is a truncation error.
    pub fn field(&self) -> Option<SdpField> {
        match self {
            Self::Truncated { field, .. } => Some(*field),
            Self::Io(_) => None,
        }
    }
}

/// Read records from an already decompressed manifest stream.
///
/// # Errors
///
/// Returns [`PackageFormatError::Truncated`] naming the field a short read
/// happened in, or [`PackageFormatError::Io`] for read failures.
pub fn read_sdp<R: Read>(mut reader: R) -> Result<Vec<FileEntry>, PackageFormatError> {
    let mut entries = Vec::new();
    loop {
        let index = entries.len();
        let mut len = [0u8; 1];
        if read_full(&mut reader, &mut len)? == 0 {
            break;
        }

        let mut name = vec![0u8; usize::from(len[0])];
        let mut digest = [0u8; 16];
        let mut crc32 = [0u8; 4];
        let mut size = [0u8; 4];
        for (buf, field) in [
            (name.as_mut_slice(), SdpField::Name),
            (digest.as_mut_slice(), SdpField::Md5),
            (crc32.as_mut_slice(), SdpField::Crc32),
            (size.as_mut_slice(), SdpField::Size),
        ] {
            if read_full(&mut reader, buf)? < buf.len() {
                return Err(PackageFormatError::Truncated { field, index });
            }
        }

        entries.push(FileEntry {
            name: String::from_utf8_lossy(&name).into_owned(),
            digest: Md5Digest::from_bytes(digest),
            crc32: u32::from_be_bytes(crc32),
            size: u32::from_be_bytes(size),
        });
    }
    Ok(entries)
}

/// Decompress and decode a manifest held in memory or on disk.
///
/// # Errors
///
/// See [`read_sdp`].
pub fn decode_sdp<R: Read>(compressed: R) -> Result<Vec<FileEntry>, PackageFormatError> {
    read_sdp(gunzip_reader(compressed))
}

/// Write a single uncompressed record.
///
/// # Errors
///
/// Fails with [`io::ErrorKind::InvalidInput`] if the name is longer than
/// 255 bytes, otherwise propagates write errors.
pub fn write_entry<W: Write>(writer: &mut W, entry: &FileEntry) -> io::Result<()> {
    let name = entry.name.as_bytes();
    let len = u8::try_from(name.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("file name longer than 255 bytes: {}", entry.name),
        )
    })?;
    writer.write_all(&[len])?;
    writer.write_all(name)?;
    writer.write_all(entry.digest.as_bytes())?;
    writer.write_all(&entry.crc32.to_be_bytes())?;
    writer.write_all(&entry.size.to_be_bytes())
}

/// Encode and gzip a complete manifest.
///
/// # Errors
///
/// See [`write_entry`].
pub fn encode_sdp(entries: &[FileEntry]) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    for entry in entries {
        write_entry(&mut raw, entry)?;
    }
    gzip(&raw)
}
