//! Merged global manifest cache (`packages.gz`).
//!
//! Normalised form: one line per package,
//! `tag1|tag2,content_id,dep1|dep2,package_name`.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::compress::read_gzip_text;
use crate::types::{
    ManifestError, PackageRecord, numbered_lines, parse_content_id, split_fields, split_psv,
};

/// Decode a decompressed global manifest.
///
/// A repeated name replaces the earlier record in place.
///
/// # Errors
///
/// Returns a [`ManifestError`] for a short line or invalid content id.
pub fn parse_packages(text: &str) -> Result<Vec<PackageRecord>, ManifestError> {
    let mut records: Vec<PackageRecord> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (line_no, line) in numbered_lines(text) {
        let [tags, content_id, deps, name] = split_fields::<4>(line, line_no)?;
        let record = PackageRecord::new(
            name,
            parse_content_id(content_id, line_no)?,
            split_psv(deps).map(str::to_string),
        )
        .with_tags(split_psv(tags));

        match by_name.get(&record.name) {
            Some(&index) => records[index] = record,
            None => {
                by_name.insert(record.name.clone(), records.len());
                records.push(record);
            }
        }
    }
    Ok(records)
}

/// Read and decode a gzip-compressed global manifest.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] for invalid gzip, otherwise the errors of
/// [`parse_packages`].
pub fn read_packages<R: Read>(reader: R) -> Result<Vec<PackageRecord>, ManifestError> {
    parse_packages(&read_gzip_text(reader)?)
}

/// Encode records as global manifest text.
///
/// Tags and dependency names that cannot survive the format (they contain
/// `|`, `,` or a line break) are left out, as is any record whose name
/// contains a line break.
pub fn encode_packages<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a PackageRecord>,
{
    let mut out = String::new();
    for record in records {
        if record.name.contains(['\n', '\r']) {
            continue;
        }
        let tags = join_psv(record.tags.iter());
        let deps = join_psv(record.dependencies.iter());
        out.push_str(&tags);
        out.push(',');
        out.push_str(record.content_id.as_str());
        out.push(',');
        out.push_str(&deps);
        out.push(',');
        out.push_str(&record.name);
        out.push('\n');
    }
    out
}

/// Gzip-encode records into `writer`.
///
/// # Errors
///
/// Propagates write errors from `writer`.
pub fn write_packages<'a, W, I>(writer: W, records: I) -> io::Result<W>
where
    W: Write,
    I: IntoIterator<Item = &'a PackageRecord>,
{
    let mut encoder = GzEncoder::new(writer, Compression::default());
    encoder.write_all(encode_packages(records).as_bytes())?;
    encoder.finish()
}

fn join_psv<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items
        .filter(|s| !s.is_empty() && !s.contains(['|', ',', '\n', '\r']))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ContentId;

    fn record(name: &str, id: &str, deps: &[&str], tags: &[&str]) -> PackageRecord {
        PackageRecord::new(
            name,
            ContentId::new(id).unwrap(),
            deps.iter().map(|d| (*d).to_string()),
        )
        .with_tags(tags.iter().copied())
    }

    #[test]
    fn encode_then_parse_preserves_records() {
        let records = vec![
            record("XTA 9.6", "1234", &["dependency"], &["xta:latest", "xta:stable"]),
            record("dependency", "5678", &[], &[]),
            record("Comma, Inc", "90AB", &["a", "b"], &["c:1"]),
        ];
        let text = encode_packages(&records);
        assert_eq!(parse_packages(&text).unwrap(), records);
    }

    #[test]
    fn gzip_writer_round_trips() {
        let records = vec![record("dependency", "5678", &[], &["d:latest"])];
        let packed = write_packages(Vec::new(), &records).unwrap();
        assert_eq!(read_packages(packed.as_slice()).unwrap(), records);
    }

    #[test]
    fn unencodable_tags_are_dropped() {
        let records = vec![record("p", "1", &[], &["ok", "bad|tag"])];
        let parsed = parse_packages(&encode_packages(&records)).unwrap();
        assert_eq!(parsed[0].tags.iter().collect::<Vec<_>>(), ["ok"]);
    }

    #[test]
    fn repeated_name_replaces_record() {
        let parsed = parse_packages("a,1,,P\nb,2,,P\n").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].content_id.as_str(), "2");
    }

    #[test]
    fn encoding_is_one_line_per_package() {
        let records = vec![record("XTA 9.6", "1234", &["dependency"], &["xta:latest"])];
        assert_eq!(
            encode_packages(&records),
            "xta:latest,1234,dependency,XTA 9.6\n"
        );
    }
}
