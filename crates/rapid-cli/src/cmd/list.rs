//! `list-packages`, `list-installed-packages`, `list-tags` and
//! `list-pinned-tags`.

use anyhow::Result;

use super::Session;
use crate::ui::list::{heading, package_row, tag_row};

/// Installed packages matching `term`, then the other packages too if
/// `available`.
pub fn list_packages(session: &Session, term: &str, available: bool) -> Result<()> {
    let matcher = session.matcher(term)?;
    let graph = session.graph()?;

    println!("{}", heading("Installed packages:"));
    for id in session.catalog.installed_packages()? {
        let package = graph.package(id);
        if matcher.matches(package.name()) {
            println!("{}", package_row(package.name(), package.tags()));
        }
    }

    if available {
        println!("{}", heading("Available packages:"));
        for id in session.catalog.not_installed_packages()? {
            let package = graph.package(id);
            if matcher.matches(package.name()) {
                println!("{}", package_row(package.name(), package.tags()));
            }
        }
    }
    Ok(())
}

/// Pinned tags matching `term`, then the unpinned tags too if `available`.
pub fn list_tags(session: &Session, term: &str, available: bool) -> Result<()> {
    let matcher = session.matcher(term)?;
    let graph = session.graph()?;

    println!("{}", heading("Pinned tags:"));
    for tag in session.pins.iter().filter(|t| matcher.matches(t)) {
        let package = graph.by_tag(tag).map(|id| graph.package(id).name());
        println!("{}", tag_row(tag, package));
    }

    if available {
        println!("{}", heading("Available tags:"));
        for (tag, id) in graph.tags() {
            if !session.pins.contains(tag) && matcher.matches(tag) {
                println!("{}", tag_row(tag, Some(graph.package(id).name())));
            }
        }
    }
    Ok(())
}
