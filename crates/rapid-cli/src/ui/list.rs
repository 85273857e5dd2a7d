//! Rows for the `list-*` verbs.

use crossterm::style::Stylize;

const NAME_WIDTH: usize = 40;

/// Section heading, e.g. `Installed packages:`.
pub fn heading(text: &str) -> String {
    text.bold().to_string()
}

/// A package name followed by its tags.
pub fn package_row<I, S>(name: &str, tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags: Vec<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
    format!("  {name:<NAME_WIDTH$} ({})", tags.join(", "))
}

/// A tag followed by the package it names, or a dangling marker.
pub fn tag_row(tag: &str, package: Option<&str>) -> String {
    match package {
        Some(name) => format!("  {tag:<NAME_WIDTH$} ({name})"),
        None => format!("  {tag:<NAME_WIDTH$} [dangling tag]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_row() {
        let row = package_row("XTA 9.6", ["xta:latest", "xta:9.6"]);
        assert!(row.starts_with("  XTA 9.6 "));
        assert!(row.ends_with(" (xta:latest, xta:9.6)"));
        assert_eq!(row.find('('), Some(2 + NAME_WIDTH + 1));
    }

    #[test]
    fn test_tag_rows() {
        assert!(tag_row("xta:latest", Some("XTA 9.6")).ends_with("(XTA 9.6)"));
        assert!(tag_row("gone:tag", None).ends_with("[dangling tag]"));
    }
}
