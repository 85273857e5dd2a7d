//! Integration tests for the `rapid` command-line interface.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use mockito::{Matcher, Server, ServerGuard};
use rapid_core::Pool;
use rapid_schema::compress::gzip;
use rapid_schema::sdp::encode_sdp;
use rapid_schema::streamer::encode_response;
use rapid_schema::{FileEntry, Md5Digest};
use tempfile::TempDir;

/// A data directory in a temp dir and a mock repository server with
/// `XTA 9.6` (tag `xta:latest`, one empty file `foo`) depending on
/// `dependency` (no files).
struct TestContext {
    temp_dir: TempDir,
    datadir: PathBuf,
    server: ServerGuard,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let datadir = temp_dir.path().join("spring");
        let mut server = Server::new();
        let repo = format!("{}/ts1", server.url());

        server
            .mock("GET", "/repos.gz")
            .with_body(gz(format!(",{repo},,\n").as_bytes()))
            .create();
        server
            .mock("GET", "/ts1/versions.gz")
            .with_body(gz(b"xta:latest,1234,dependency,XTA 9.6\n,5678,,dependency\n"))
            .create();
        let foo = FileEntry {
            name: "foo".to_string(),
            digest: Md5Digest::compute(b""),
            crc32: 0,
            size: 0,
        };
        server
            .mock("GET", "/ts1/packages/1234.sdp")
            .with_body(encode_sdp(&[foo]).expect("encode sdp"))
            .create();
        server
            .mock("GET", "/ts1/packages/5678.sdp")
            .with_body(gz(b""))
            .create();
        server
            .mock("POST", "/ts1/streamer.cgi")
            .match_query(Matcher::Any)
            .with_body(encode_response([gz(b"").as_slice()]))
            .create();

        Self {
            temp_dir,
            datadir,
            server,
        }
    }

    fn rapid(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_rapid"))
            .arg("--datadir")
            .arg(&self.datadir)
            .args(args)
            .env("HOME", self.temp_dir.path())
            .env("RAPID_MASTER_URL", format!("{}/repos.gz", self.server.url()))
            .env("RAPID_REFRESH_INTERVAL_SECS", "0")
            .env_remove("RAPID_DATADIR")
            .env_remove("RUST_LOG")
            .stdin(Stdio::null())
            .output()
            .expect("failed to run rapid")
    }

    fn installed(&self, content_id: &str) -> bool {
        self.datadir
            .join("packages")
            .join(format!("{content_id}.sdp"))
            .exists()
    }

    fn pins(&self) -> String {
        fs::read_to_string(self.datadir.join("rapid/main.cfg")).unwrap_or_default()
    }
}

fn gz(data: &[u8]) -> Vec<u8> {
    gzip(data).expect("gzip")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_lists_verbs() {
    let output = Command::new(env!("CARGO_BIN_EXE_rapid"))
        .arg("--help")
        .output()
        .expect("failed to run rapid");
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Usage:"));
    assert!(out.contains("uninstall-unpinned"));
    assert!(out.contains("make-sdd"));
}

#[test]
fn test_pin_installs_with_dependencies() {
    let ctx = TestContext::new();
    let output = ctx.rapid(&["pin", "xta"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Pinning: xta:latest"));
    assert!(out.contains("Installing dependency: dependency"));
    assert!(out.contains("Installing: XTA 9.6"));
    assert!(ctx.installed("1234"));
    assert!(ctx.installed("5678"));
    assert!(ctx.pins().contains("xta:latest"));

    let again = ctx.rapid(&["pin", "xta:latest"]);
    assert!(stdout(&again).contains("Already pinned: xta:latest"));
    assert!(stdout(&again).contains("Already installed: XTA 9.6"));
}

#[test]
fn test_list_tags_marks_dangling() {
    let ctx = TestContext::new();
    fs::create_dir_all(ctx.datadir.join("rapid")).unwrap();
    fs::write(ctx.datadir.join("rapid/main.cfg"), "[tags]\npinned = gone:tag\n").unwrap();

    let output = ctx.rapid(&["list-tags"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("gone:tag"));
    assert!(out.contains("[dangling tag]"));
    assert!(out.contains("(XTA 9.6)"));
}

#[test]
fn test_no_match_fails() {
    let ctx = TestContext::new();
    let output = ctx.rapid(&["install", "zzz"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No names matching zzz found."));
}

#[test]
fn test_uninstall_unpins() {
    let ctx = TestContext::new();
    assert!(ctx.rapid(&["pin", "xta"]).status.success());

    let output = ctx.rapid(&["uninstall", "XTA"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Unpinning: xta:latest"));
    assert!(out.contains("Uninstalling: XTA 9.6"));
    assert!(!ctx.installed("1234"));
    assert!(ctx.installed("5678"));
    assert!(!ctx.pins().contains("xta:latest"));
}

#[test]
fn test_uninstall_skips_needed_dependency() {
    let ctx = TestContext::new();
    assert!(ctx.rapid(&["install", "xta"]).status.success());

    let output = ctx.rapid(&["uninstall", "dependency"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Can not uninstall because of dependencies: dependency"));
    assert!(ctx.installed("5678"));
}

#[test]
fn test_uninstall_unpinned() {
    let ctx = TestContext::new();
    assert!(ctx.rapid(&["install", "xta"]).status.success());

    let declined = ctx.rapid(&["uninstall-unpinned"]);
    assert!(stdout(&declined).contains("Uninstalled 0 package(s)."));
    assert!(ctx.installed("1234"));

    let output = ctx.rapid(&["-y", "uninstall-unpinned"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Uninstalled 2 package(s)."));
    assert!(!ctx.installed("1234"));
    assert!(!ctx.installed("5678"));
}

#[test]
fn test_collect_pool() {
    let ctx = TestContext::new();
    let orphan = Md5Digest::compute(b"orphan");
    let pool = Pool::new(ctx.datadir.join("pool"));
    pool.put(&orphan, &gz(b"orphan")).unwrap();

    let declined = ctx.rapid(&["collect-pool"]);
    assert!(declined.status.success(), "{}", stderr(&declined));
    assert!(stdout(&declined).contains("Removed 0 pool file(s)."));
    assert!(pool.contains(&orphan));

    let output = ctx.rapid(&["--yes", "collect-pool"]);
    assert!(stdout(&output).contains("Removed 1 pool file(s)."));
    assert!(!pool.contains(&orphan));
}

#[test]
fn test_make_sdd() {
    let ctx = TestContext::new();
    let output = ctx.rapid(&["make-sdd", "xta:latest", "xta.sdd"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let foo = ctx.datadir.join("mods/xta.sdd/foo");
    assert_eq!(fs::read(foo).unwrap(), b"");
}

#[test]
fn test_make_sdd_unknown_package() {
    let ctx = TestContext::new();
    let output = ctx.rapid(&["make-sdd", "nothing", "x.sdd"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no package or tag named 'nothing'"));
}
