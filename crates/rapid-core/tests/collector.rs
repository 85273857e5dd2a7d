//! Integration tests for the collectors.

mod common;

use std::cell::Cell;
use std::fs;

use common::{TestContext, entry, gz, id, sdp};
use rapid_core::{
    Collector, DependencyError, Error, FixedAnswer, Installer, Interaction, NullProgress,
    PinnedTags,
};
use rapid_schema::Md5Digest;

/// Fails the test if asked anything.
struct NoQuestions;

impl Interaction for NoQuestions {
    fn confirm(&self, question: &str) -> bool {
        panic!("unexpected question: {question}");
    }

    fn important_warning(&self, lines: &[String]) {
        panic!("unexpected warning: {lines:?}");
    }
}

/// Answers yes once, then no.
#[derive(Default)]
struct YesOnce {
    asked: Cell<usize>,
}

impl Interaction for YesOnce {
    fn confirm(&self, _question: &str) -> bool {
        self.asked.set(self.asked.get() + 1);
        self.asked.get() == 1
    }

    fn important_warning(&self, _lines: &[String]) {}
}

fn orphan(ctx: &TestContext) -> Md5Digest {
    let digest = Md5Digest::compute(b"orphan");
    rapid_core::Pool::new(ctx.layout().pool_dir())
        .put(&digest, &gz(b"orphan"))
        .unwrap();
    digest
}

#[test]
fn test_pool_gc_removes_only_orphans() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    Installer::new(&catalog)
        .install_closure(id(&catalog, "xta:latest"), &NullProgress)
        .unwrap();
    let referenced = Md5Digest::compute(b"");
    let orphan = orphan(&ctx);

    let collector = Collector::new(&catalog);
    let plan = collector.pool_plan().unwrap();
    assert_eq!(plan.garbage.len(), 1);
    assert_eq!(plan.garbage[0].digest, orphan);
    assert_eq!(plan.bytes, plan.garbage[0].size);

    assert_eq!(collector.collect_pool(&FixedAnswer(true)).unwrap(), 1);
    assert!(catalog.pool().contains(&referenced));
    assert!(!catalog.pool().contains(&orphan));
}

#[test]
fn test_pool_gc_needs_second_confirmation() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    let orphan = orphan(&ctx);

    let ui = YesOnce::default();
    assert_eq!(Collector::new(&catalog).collect_pool(&ui).unwrap(), 0);
    assert_eq!(ui.asked.get(), 2);
    assert!(catalog.pool().contains(&orphan));
}

#[test]
fn test_pool_gc_without_garbage_asks_nothing() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    Installer::new(&catalog)
        .install_closure(id(&catalog, "xta:latest"), &NullProgress)
        .unwrap();
    assert_eq!(Collector::new(&catalog).collect_pool(&NoQuestions).unwrap(), 0);
}

#[test]
fn test_pool_gc_keeps_blobs_of_unknown_installed_manifests() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    let orphan = orphan(&ctx);
    fs::write(
        ctx.installed_path("FFFF"),
        sdp(&[entry("kept.txt", b"orphan")]),
    )
    .unwrap();

    assert!(Collector::new(&catalog).pool_plan().unwrap().is_empty());
    assert!(catalog.pool().contains(&orphan));
}

#[test]
fn test_pool_gc_refuses_unreadable_manifest() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    orphan(&ctx);
    fs::write(ctx.installed_path("BAD0"), gz(b"\x09trunc")).unwrap();

    assert!(matches!(
        Collector::new(&catalog).pool_plan(),
        Err(Error::PackageFormat { .. })
    ));
}

#[test]
fn test_package_gc_uninstalls_unpinned() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    Installer::new(&catalog)
        .install_closure(id(&catalog, "xta:latest"), &NullProgress)
        .unwrap();
    let pins = PinnedTags::load(catalog.layout().pins_file()).unwrap();

    let collector = Collector::new(&catalog);
    let plan = collector.package_plan(&pins).unwrap();
    assert_eq!(
        catalog.graph().unwrap().names(&plan.garbage),
        ["XTA 9.6", "dependency"]
    );

    assert_eq!(collector.collect_packages(&pins, &FixedAnswer(true)).unwrap(), 2);
    assert!(catalog.installed_packages().unwrap().is_empty());
}

#[test]
fn test_package_gc_declined() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    Installer::new(&catalog)
        .install_closure(id(&catalog, "xta:latest"), &NullProgress)
        .unwrap();
    let pins = PinnedTags::load(catalog.layout().pins_file()).unwrap();

    let collected = Collector::new(&catalog)
        .collect_packages(&pins, &FixedAnswer(false))
        .unwrap();
    assert_eq!(collected, 0);
    assert_eq!(catalog.installed_packages().unwrap().len(), 2);
}

#[test]
fn test_package_gc_keeps_pinned_closure() {
    let ctx = TestContext::new();
    let catalog = ctx.catalog();
    Installer::new(&catalog)
        .install_closure(id(&catalog, "xta:latest"), &NullProgress)
        .unwrap();
    let mut pins = PinnedTags::load(catalog.layout().pins_file()).unwrap();
    pins.add("xta:latest").unwrap();

    let collector = Collector::new(&catalog);
    assert!(collector.package_plan(&pins).unwrap().is_empty());
    assert_eq!(collector.collect_packages(&pins, &NoQuestions).unwrap(), 0);
}

#[test]
fn test_package_gc_reports_cycle() {
    let ctx = TestContext::new();
    ctx.serve(common::VERSIONS, gz(b",0001,b,a\n,0002,a,b\n"));
    let catalog = ctx.catalog();
    catalog.graph().unwrap();
    fs::write(ctx.installed_path("0001"), gz(b"")).unwrap();
    fs::write(ctx.installed_path("0002"), gz(b"")).unwrap();

    let pins = PinnedTags::load(catalog.layout().pins_file()).unwrap();
    match Collector::new(&catalog).package_plan(&pins) {
        Err(Error::Dependency(DependencyError::Cycle { cycle })) => {
            assert_eq!(cycle.len(), 3);
            assert_eq!(cycle.first(), cycle.last());
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}
