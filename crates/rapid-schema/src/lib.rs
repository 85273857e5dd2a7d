//! Wire and on-disk formats used by rapid repositories.
//!
//! Everything here is pure decoding and encoding over `Read`/`Write`; no
//! networking and no knowledge of the data directory layout.
//!
//! | File | Module |
//! |------|--------|
//! | `repos.gz` | [`repos`] |
//! | `versions.gz` | [`versions`] |
//! | `packages.gz` | [`packages`] |
//! | `<content_id>.sdp` | [`sdp`] |
//! | `streamer.cgi` bodies | [`streamer`] |

pub mod compress;
pub mod hash;
pub mod packages;
pub mod repos;
pub mod sdp;
pub mod streamer;
pub mod types;
pub mod versions;

// Re-exports
pub use hash::{ContentId, DigestError, Md5Digest};
pub use sdp::{FileEntry, PackageFormatError, SdpField};
pub use streamer::{Frame, FrameReader, StreamerFormatError};
pub use types::{ManifestError, PackageRecord};
pub use versions::{Conflict, Malformed, VersionManifest};
