#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use rapid_core::{Catalog, DataDir, MemoryTransfer, PackageId, Settings};
use rapid_schema::compress::gzip;
use rapid_schema::sdp::encode_sdp;
use rapid_schema::{FileEntry, Md5Digest};
use tempfile::TempDir;

pub const REPO: &str = "http://ts1";
pub const VERSIONS: &str = "http://ts1/versions.gz";

/// A data directory in a temp dir, served by an in-memory repository with
/// two packages: `XTA 9.6` (tag `xta:latest`, one empty file `foo`) and its
/// dependency `dependency` (no files). A third line reuses the name
/// `dependency` with another content id.
pub struct TestContext {
    pub temp_dir: TempDir,
    pub www: Arc<MemoryTransfer>,
    pub settings: Settings,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let www = Arc::new(MemoryTransfer::new());
        let settings = Settings::default().with_refresh_interval(None);

        www.insert(settings.master_url.clone(), gz(b",http://ts1,,\n"));
        www.insert(
            VERSIONS,
            gz(b"xta:latest,1234,dependency,XTA 9.6\n,5678,,dependency\n,90AB,,dependency\n"),
        );
        www.insert(
            "http://ts1/packages/1234.sdp",
            sdp(&[entry("foo", b"")]),
        );
        www.insert("http://ts1/packages/5678.sdp", gz(b""));
        www.insert("http://ts1/packages/90AB.sdp", gz(b""));
        www.insert("http://ts1/streamer.cgi?1234", frames(&[gz(b"")]));

        Self {
            temp_dir,
            www,
            settings,
        }
    }

    pub fn layout(&self) -> DataDir {
        DataDir::new(self.temp_dir.path().join("spring"))
    }

    /// A fresh catalog over the same data directory and server, as a new
    /// process would see it.
    pub fn catalog(&self) -> Catalog {
        Catalog::open(self.layout(), self.settings.clone(), self.www.clone())
            .expect("failed to open catalog")
    }

    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.www.insert(url, body);
    }

    pub fn serve_master(&self, body: Vec<u8>) {
        self.www.insert(self.settings.master_url.clone(), body);
    }

    pub fn installed_path(&self, content_id: &str) -> PathBuf {
        self.layout().package_dir().join(format!("{content_id}.sdp"))
    }
}

pub fn gz(data: &[u8]) -> Vec<u8> {
    gzip(data).expect("gzip")
}

pub fn entry(name: &str, content: &[u8]) -> FileEntry {
    FileEntry {
        name: name.to_string(),
        digest: Md5Digest::compute(content),
        crc32: 0,
        size: content.len() as u32,
    }
}

pub fn sdp(entries: &[FileEntry]) -> Vec<u8> {
    encode_sdp(entries).expect("encode sdp")
}

/// A streamer response carrying `payloads` as they are.
pub fn frames(payloads: &[Vec<u8>]) -> Vec<u8> {
    rapid_schema::streamer::encode_response(payloads.iter().map(Vec::as_slice))
}

pub fn id(catalog: &Catalog, name_or_tag: &str) -> PackageId {
    catalog
        .find(name_or_tag)
        .expect("catalog loads")
        .unwrap_or_else(|| panic!("no package '{name_or_tag}'"))
}
