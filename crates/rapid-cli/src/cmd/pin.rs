//! `pin` and `unpin`.

use anyhow::Result;

use super::{Session, install};

/// Pin every tag matching `term` and install the packages they name.
pub fn pin(session: &mut Session, term: &str) -> Result<()> {
    let tags: Vec<String> = session
        .graph()?
        .tags()
        .map(|(tag, _)| tag.to_string())
        .collect();

    for tag in session.select("tag", term, &tags)? {
        if session.pins.add(&tag)? {
            println!("Pinning: {tag}");
        } else {
            println!("Already pinned: {tag}");
        }
        if let Some(id) = session.graph()?.by_tag(&tag) {
            install::install_single(session, id)?;
        }
    }
    Ok(())
}

/// Unpin every pinned tag matching `term`. Nothing is uninstalled.
pub fn unpin(session: &mut Session, term: &str) -> Result<()> {
    let pinned: Vec<String> = session.pins.iter().map(str::to_string).collect();
    for tag in session.select("pinned tag", term, &pinned)? {
        unpin_single(session, &tag)?;
    }
    Ok(())
}

pub(crate) fn unpin_single(session: &mut Session, tag: &str) -> Result<()> {
    session.pins.remove(tag)?;
    println!("Unpinning: {tag}");
    Ok(())
}
