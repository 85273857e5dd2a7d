//! Gzip helpers shared by every on-disk and on-wire format.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, MultiGzDecoder};
use flate2::write::GzEncoder;

/// Gzip `data` in memory.
///
/// # Errors
///
/// Only fails if the in-memory encoder reports an I/O error.
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a single gzip member held in memory.
///
/// # Errors
///
/// Returns an I/O error if `data` is not a complete, valid gzip stream.
pub fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Wrap a reader over a (possibly multi-member) gzip file.
pub fn gunzip_reader<R: Read>(reader: R) -> MultiGzDecoder<R> {
    MultiGzDecoder::new(reader)
}

/// Read a gzip-compressed text manifest into a string.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; names in
/// upstream manifests are not guaranteed to be UTF-8.
///
/// # Errors
///
/// Returns an I/O error if the stream is not valid gzip.
pub fn read_gzip_text<R: Read>(reader: R) -> io::Result<String> {
    let mut raw = Vec::new();
    gunzip_reader(reader).read_to_end(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
///
/// Returns the number of bytes read; anything short of `buf.len()` means
/// the stream ended.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_then_gunzip_is_identity() {
        let packed = gzip(b"xta:latest,1234,dependency,XTA 9.6\n").unwrap();
        assert_eq!(gunzip(&packed).unwrap(), b"xta:latest,1234,dependency,XTA 9.6\n");
    }

    #[test]
    fn gunzip_rejects_plain_bytes() {
        assert!(gunzip(b"definitely not gzip").is_err());
    }

    #[test]
    fn read_full_reports_short_streams() {
        let mut reader = &b"abc"[..];
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 3);
    }
}
