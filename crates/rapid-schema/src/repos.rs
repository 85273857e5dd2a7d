//! Master repository list (`repos.gz`): lines of `tag,url,...`.

use std::collections::BTreeSet;
use std::io::Read;

use crate::compress::read_gzip_text;
use crate::types::{ManifestError, numbered_lines};

/// Extract the de-duplicated set of repository URLs from a decompressed
/// repository list. Only the second column is used; rows with an empty URL
/// are skipped.
///
/// # Errors
///
/// Returns [`ManifestError::FieldCount`] for a row without a URL column.
pub fn parse_repository_list(text: &str) -> Result<BTreeSet<String>, ManifestError> {
    let mut urls = BTreeSet::new();
    for (line_no, line) in numbered_lines(text) {
        let mut columns = line.split(',');
        let _tag = columns.next();
        let url = columns.next().ok_or(ManifestError::FieldCount {
            line: line_no,
            expected: 2,
            found: 1,
        })?;
        let url = url.trim().trim_end_matches('/');
        if !url.is_empty() {
            urls.insert(url.to_string());
        }
    }
    Ok(urls)
}

/// Read and parse a gzip-compressed repository list.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] if the stream is not valid gzip, or a
/// parse error from [`parse_repository_list`].
pub fn read_repository_list<R: Read>(reader: R) -> Result<BTreeSet<String>, ManifestError> {
    parse_repository_list(&read_gzip_text(reader)?)
}
