//! `uninstall-unpinned` and `collect-pool`.

use anyhow::{Context, Result};
use rapid_core::Collector;

use super::Session;

/// Uninstall packages outside the closure of the pinned tags, after
/// confirmation.
pub fn uninstall_unpinned(session: &Session) -> Result<()> {
    let removed = Collector::new(&session.catalog)
        .collect_packages(&session.pins, &session.terminal)
        .context("failed to uninstall unpinned packages")?;
    println!("Uninstalled {removed} package(s).");
    Ok(())
}

/// Delete pool files no installed package needs, after two confirmations.
pub fn collect_pool(session: &Session) -> Result<()> {
    let removed = Collector::new(&session.catalog)
        .collect_pool(&session.terminal)
        .context("failed to collect the pool")?;
    println!("Removed {removed} pool file(s).");
    Ok(())
}
