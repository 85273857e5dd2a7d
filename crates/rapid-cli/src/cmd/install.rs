//! `install` and `uninstall`.

use anyhow::{Context, Result};
use rapid_core::{Installer, PackageId};

use super::{Session, pin};
use crate::ui::ProgressBar;

/// Install every package whose name matches `term`, with dependencies.
pub fn install(session: &Session, term: &str) -> Result<()> {
    let graph = session.graph()?;
    let mut names: Vec<&str> = graph.packages().map(|(_, p)| p.name()).collect();
    names.sort_unstable();
    for name in session.select("name", term, names)? {
        if let Some(id) = graph.by_name(&name) {
            install_single(session, id)?;
        }
    }
    Ok(())
}

/// Install `id` after its missing dependencies, one progress bar each.
pub(crate) fn install_single(session: &Session, id: PackageId) -> Result<()> {
    let graph = session.graph()?;
    let installer = Installer::new(&session.catalog);
    for step in installer.plan(id)? {
        let name = graph.package(step).name();
        if installer.is_installed(step)? {
            if step == id {
                println!("Already installed: {name}");
            }
            continue;
        }
        if step == id {
            println!("Installing: {name}");
        } else {
            println!("Installing dependency: {name}");
        }
        let bar = ProgressBar::new();
        installer
            .install(step, &bar)
            .with_context(|| format!("failed to install {name}"))?;
        bar.finish();
    }
    Ok(())
}

/// Uninstall every installed package whose name matches `term` and unpin
/// its tags. Packages other installed packages need are skipped.
pub fn uninstall(session: &mut Session, term: &str) -> Result<()> {
    let names: Vec<String> = {
        let graph = session.graph()?;
        session
            .catalog
            .installed_packages()?
            .into_iter()
            .map(|id| graph.package(id).name().to_string())
            .collect()
    };

    for name in session.select("name", term, &names)? {
        let Some(id) = session.graph()?.by_name(&name) else {
            continue;
        };
        if !Installer::new(&session.catalog).can_be_uninstalled(id)? {
            println!("Can not uninstall because of dependencies: {name}");
            continue;
        }
        let pinned: Vec<String> = session
            .graph()?
            .package(id)
            .tags()
            .iter()
            .filter(|tag| session.pins.contains(tag))
            .cloned()
            .collect();
        for tag in &pinned {
            pin::unpin_single(session, tag)?;
        }
        println!("Uninstalling: {name}");
        Installer::new(&session.catalog)
            .uninstall(id)
            .with_context(|| format!("failed to uninstall {name}"))?;
    }
    Ok(())
}
