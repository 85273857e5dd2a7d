//! `upgrade` and `clean-upgrade`.

use anyhow::Result;
use tracing::warn;

use super::{Session, collect, install};

/// Install the current package of every pinned tag.
pub fn upgrade(session: &Session) -> Result<()> {
    let graph = session.graph()?;
    for tag in session.pins.iter() {
        match graph.by_tag(tag) {
            Some(id) => install::install_single(session, id)?,
            None => warn!(tag, "pinned tag does not name any package"),
        }
    }
    Ok(())
}

/// `upgrade`, then uninstall whatever the pinned tags no longer need.
pub fn clean_upgrade(session: &Session) -> Result<()> {
    upgrade(session)?;
    collect::uninstall_unpinned(session)
}
