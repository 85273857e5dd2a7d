//! `make-sdd`: unpack a package into `mods/`.

use anyhow::{Context, Result};
use rapid_core::Installer;

use super::Session;
use crate::ui::ProgressBar;

/// Extract the package named by `package` (name or tag) into `mods/<dir>`.
pub fn make_sdd(session: &Session, package: &str, dir: &str) -> Result<()> {
    let id = session
        .catalog
        .find(package)?
        .with_context(|| format!("no package or tag named '{package}'"))?;
    let name = session.graph()?.package(id).name();

    let bar = ProgressBar::new();
    let path = Installer::new(&session.catalog)
        .extract(id, dir, &bar)
        .with_context(|| format!("failed to extract {name}"))?;
    bar.finish();
    println!("Extracted {name} to {}", path.display());
    Ok(())
}
