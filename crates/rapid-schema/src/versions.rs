//! Per-repository version manifest (`versions.gz`).
//!
//! One line per tag: `tag,content_id,dep1|dep2|...,package_name`. A package
//! reachable through several tags appears on several lines.

use std::collections::HashMap;
use std::io::Read;

use crate::compress::read_gzip_text;
use crate::hash::ContentId;
use crate::types::{
    ManifestError, PackageRecord, numbered_lines, parse_content_id, split_fields, split_psv,
};

/// A line whose package name was already bound to a different payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// 1-based line number of the rejected line.
    pub line: usize,
    /// Package name shared with the earlier line.
    pub name: String,
    /// Tag the rejected line tried to add, if any.
    pub tag: Option<String>,
    /// Content id carried by the rejected line.
    pub content_id: ContentId,
}

/// A line that could not be decoded at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    /// 1-based line number of the skipped line.
    pub line: usize,
    /// What was wrong with it.
    pub reason: String,
}

/// Decoded version manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionManifest {
    /// Packages in order of first appearance.
    pub packages: Vec<PackageRecord>,
    /// Lines dropped because they disagree with the first occurrence of
    /// the same package name.
    pub conflicts: Vec<Conflict>,
    /// Lines skipped because they have too few fields or an unusable
    /// content id.
    pub malformed: Vec<Malformed>,
}

impl VersionManifest {
    /// Look up a package by name.
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.iter().find(|p| p.name == name)
    }
}

/// Decode a decompressed version manifest.
///
/// The first line naming a package fixes its content id and dependency
/// set. Later lines for the same name with the same identity only add
/// their tag; lines with a different identity are recorded in
/// [`VersionManifest::conflicts`] and otherwise ignored. Lines that cannot
/// be decoded end up in [`VersionManifest::malformed`].
pub fn parse_versions(text: &str) -> VersionManifest {
    let mut manifest = VersionManifest::default();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (line_no, line) in numbered_lines(text) {
        let parsed = split_fields::<4>(line, line_no).and_then(|fields| {
            parse_content_id(fields[1], line_no).map(|content_id| (fields, content_id))
        });
        let ([tag, _, deps, name], content_id) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                manifest.malformed.push(Malformed {
                    line: line_no,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let candidate =
            PackageRecord::new(name, content_id, split_psv(deps).map(str::to_string));
        let tag = (!tag.is_empty()).then(|| tag.to_string());

        match by_name.get(name) {
            Some(&index) => {
                let existing = &mut manifest.packages[index];
                if existing.same_identity(&candidate) {
                    existing.tags.extend(tag);
                } else {
                    manifest.conflicts.push(Conflict {
                        line: line_no,
                        name: candidate.name,
                        tag,
                        content_id: candidate.content_id,
                    });
                }
            }
            None => {
                by_name.insert(name.to_string(), manifest.packages.len());
                manifest.packages.push(candidate.with_tags(tag));
            }
        }
    }

    manifest
}

/// Read and decode a gzip-compressed version manifest.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] for invalid gzip.
pub fn read_versions<R: Read>(reader: R) -> Result<VersionManifest, ManifestError> {
    Ok(parse_versions(&read_gzip_text(reader)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_two_packages_one_tag() {
        let manifest = parse_versions("xta:latest,1234,dependency,XTA 9.6\n,5678,,dependency\n");
        assert_eq!(manifest.packages.len(), 2);

        let xta = manifest.get("XTA 9.6").unwrap();
        assert_eq!(xta.content_id.as_str(), "1234");
        assert!(xta.tags.contains("xta:latest"));
        assert!(xta.dependencies.contains("dependency"));

        let dep = manifest.get("dependency").unwrap();
        assert!(dep.tags.is_empty());
        assert!(dep.dependencies.is_empty());
    }

    #[test]
    fn second_identity_for_same_name_is_rejected() {
        let manifest = parse_versions(
            "xta:latest,1234,dependency,XTA 9.6\n,5678,,dependency\ndep:test,90AB,,dependency\n",
        );
        let dep = manifest.get("dependency").unwrap();
        assert_eq!(dep.content_id.as_str(), "5678");
        assert!(dep.tags.is_empty());

        assert_eq!(manifest.conflicts.len(), 1);
        let conflict = &manifest.conflicts[0];
        assert_eq!(conflict.line, 3);
        assert_eq!(conflict.tag.as_deref(), Some("dep:test"));
        assert_eq!(conflict.content_id.as_str(), "90AB");
    }

    #[test]
    fn same_identity_accumulates_tags() {
        let manifest = parse_versions("a:latest,1,x|y,A\na:stable,1,y|x,A\n");
        let a = manifest.get("A").unwrap();
        assert_eq!(a.tags.len(), 2);
        assert!(manifest.conflicts.is_empty());
    }

    #[test]
    fn differing_dependencies_are_a_conflict() {
        let manifest = parse_versions("a:latest,1,x,A\na:stable,1,x|y,A\n");
        let a = manifest.get("A").unwrap();
        assert_eq!(a.tags.iter().collect::<Vec<_>>(), ["a:latest"]);
        assert_eq!(manifest.conflicts.len(), 1);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let manifest = parse_versions("tag,1234\nxta:latest,1234,,XTA 9.6\nodd:tag,12 34,,Odd\n");
        assert_eq!(manifest.packages.len(), 1);
        assert!(manifest.get("XTA 9.6").is_some());
        assert!(manifest.get("Odd").is_none());

        let lines: Vec<_> = manifest.malformed.iter().map(|m| m.line).collect();
        assert_eq!(lines, [1, 3]);
        assert!(manifest.malformed[1].reason.contains("12 34"));
    }
}
