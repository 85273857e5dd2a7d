//! MD5 digests and package content ids.

use std::fmt;
use std::io;
use std::str::FromStr;

use md5::{Digest, Md5};
use thiserror::Error;

/// Error returned when a digest or content id string is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The string is not exactly 32 hex characters.
    #[error("Invalid MD5 digest: expected 32 hex characters, got '{0}'")]
    InvalidMd5(String),

    /// The content id cannot be used as a file stem.
    #[error("Invalid content id: '{0}'")]
    InvalidContentId(String),
}

/// MD5 digest of a pool file's *uncompressed* content.
///
/// This is the only key the pool knows: blobs live at
/// `pool/<hex[0..2]>/<hex[2..]>.gz`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Md5Digest([u8; 16]);

impl Md5Digest {
    /// Size of the raw digest in bytes.
    pub const LEN: usize = 16;

    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Compute the digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let mut out = [0u8; 16];
        out.copy_from_slice(&Md5::digest(data));
        Self(out)
    }

    /// Compute the digest of everything `reader` yields.
    ///
    /// # Errors
    ///
    /// Propagates read errors from `reader`.
    pub fn compute_reader<R: io::Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Md5::new();
        io::copy(&mut reader, &mut hasher)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(&hasher.finalize());
        Ok(Self(out))
    }

    /// Parse a 32 character hex string (either case).
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::InvalidMd5`] for anything else.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let mut out = [0u8; 16];
        hex::decode_to_slice(s, &mut out).map_err(|_| DigestError::InvalidMd5(s.to_string()))?;
        Ok(Self(out))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Md5Digest({self})")
    }
}

impl FromStr for Md5Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Repository-assigned identifier of a package's file manifest.
///
/// Not a hash of anything the client can check; it only names the
/// `<content_id>.sdp` blob in repository and local caches, so it must be a
/// safe file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(String);

impl ContentId {
    /// Validate `s` as a content id.
    ///
    /// Accepts ASCII alphanumerics, `-`, `_` and `.`, not starting with `.`.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::InvalidContentId`] if `s` is empty or could
    /// escape the directory it is joined onto.
    pub fn new(s: impl Into<String>) -> Result<Self, DigestError> {
        let s = s.into();
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(Self(s))
        } else {
            Err(DigestError::InvalidContentId(s))
        }
    }

    /// The id as written in the manifests.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the package manifest for this id (`<id>.sdp`).
    pub fn sdp_file_name(&self) -> String {
        format!("{}.sdp", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentId {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_input() {
        let digest = Md5Digest::compute(b"");
        assert_eq!(digest.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn md5_hex_parsing_accepts_uppercase() {
        let digest = Md5Digest::from_hex("D41D8CD98F00B204E9800998ECF8427E").unwrap();
        assert_eq!(digest, Md5Digest::compute(b""));
    }

    #[test]
    fn md5_hex_parsing_rejects_short_input() {
        assert!(Md5Digest::from_hex("d41d8c").is_err());
    }

    #[test]
    fn compute_reader_matches_compute() {
        let data = b"some pool file".as_slice();
        assert_eq!(
            Md5Digest::compute_reader(data).unwrap(),
            Md5Digest::compute(data)
        );
    }

    #[test]
    fn content_id_rejects_path_components() {
        assert!(ContentId::new("1234").is_ok());
        assert!(ContentId::new("90AB").is_ok());
        assert!(ContentId::new("").is_err());
        assert!(ContentId::new("../etc").is_err());
        assert!(ContentId::new("a/b").is_err());
        assert!(ContentId::new(".hidden").is_err());
    }

    #[test]
    fn content_id_sdp_file_name() {
        let id = ContentId::new("1234").unwrap();
        assert_eq!(id.sdp_file_name(), "1234.sdp");
    }
}
