//! Bulk file transfer protocol spoken with `streamer.cgi`.
//!
//! Request body: gzip of a bitmap over the package's manifest entries,
//! bit `i` selecting entry `i` (LSB first within each byte).
//!
//! Response body: one frame per selected entry, in manifest order:
//!
//! ```text
//! u32be len | len bytes of gzip-compressed file content
//! ```

use std::io::{self, Read};

use thiserror::Error;

use crate::compress::{gunzip, gzip, read_full};
use crate::hash::Md5Digest;

/// A streamer response that does not match what was requested.
#[derive(Error, Debug)]
pub enum StreamerFormatError {
    /// The server did not announce the response length.
    #[error("response has no Content-Length")]
    MissingLength,

    /// The stream ended inside the size prefix of frame `index`.
    #[error("frame {index}: short read in field 'size'")]
    TruncatedSize {
        /// 0-based position among the requested files.
        index: usize,
    },

    /// The stream ended inside the payload of frame `index`.
    #[error("frame {index}: short read in field 'data' ({actual} of {expected} bytes)")]
    TruncatedData {
        /// 0-based position among the requested files.
        index: usize,
        /// Length announced by the size prefix.
        expected: u32,
        /// Bytes actually received.
        actual: usize,
    },

    /// The payload of frame `index` does not decompress to the expected
    /// content.
    #[error("frame {index}: field 'md5' does not match {expected}")]
    DigestMismatch {
        /// 0-based position among the requested files.
        index: usize,
        /// Digest listed in the package manifest.
        expected: Md5Digest,
    },

    /// Reading the response failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StreamerFormatError {
    /// Name of the protocol field the error is about.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingLength => "Content-Length",
            Self::TruncatedSize { .. } => "size",
            Self::TruncatedData { .. } => "data",
            Self::DigestMismatch { .. } => "md5",
            Self::Io(_) => "io",
        }
    }
}

/// Pack a selection into the request bitmap.
pub fn selection_bitmap<I>(selection: I) -> Vec<u8>
where
    I: IntoIterator<Item = bool>,
{
    let mut bitmap = Vec::new();
    for (i, selected) in selection.into_iter().enumerate() {
        if i % 8 == 0 {
            bitmap.push(0);
        }
        if selected {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    bitmap
}

/// Build the gzip-compressed request body for a selection.
///
/// # Errors
///
/// Only fails if the in-memory encoder does.
pub fn encode_request<I>(selection: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = bool>,
{
    gzip(&selection_bitmap(selection))
}

/// One verified file received from the streamer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 0-based position among the requested files.
    pub index: usize,
    /// Digest the payload was verified against.
    pub digest: Md5Digest,
    /// Gzip-compressed payload, exactly as received.
    pub data: Vec<u8>,
}

/// Reads and verifies frames against the digests that were requested.
///
/// Yields one item per expected digest and stops after the first error.
/// Bytes past the last expected frame are not read.
#[derive(Debug)]
pub struct FrameReader<'a, R> {
    reader: R,
    expected: &'a [Md5Digest],
    next: usize,
    failed: bool,
}

impl<'a, R: Read> FrameReader<'a, R> {
    /// Create a reader for a response to a request selecting `expected`,
    /// in manifest order.
    pub fn new(reader: R, expected: &'a [Md5Digest]) -> Self {
        Self {
            reader,
            expected,
            next: 0,
            failed: false,
        }
    }

    fn read_frame(
        &mut self,
        index: usize,
        expected: Md5Digest,
    ) -> Result<Frame, StreamerFormatError> {
        let mut size = [0u8; 4];
        if read_full(&mut self.reader, &mut size)? < size.len() {
            return Err(StreamerFormatError::TruncatedSize { index });
        }
        let len = u32::from_be_bytes(size);

        let mut data = Vec::new();
        (&mut self.reader)
            .take(u64::from(len))
            .read_to_end(&mut data)?;
        if data.len() < len as usize {
            return Err(StreamerFormatError::TruncatedData {
                index,
                expected: len,
                actual: data.len(),
            });
        }

        let verified = gunzip(&data)
            .map(|plain| Md5Digest::compute(&plain) == expected)
            .unwrap_or(false);
        if !verified {
            return Err(StreamerFormatError::DigestMismatch { index, expected });
        }

        Ok(Frame {
            index,
            digest: expected,
            data,
        })
    }
}

impl<R: Read> Iterator for FrameReader<'_, R> {
    type Item = Result<Frame, StreamerFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let index = self.next;
        let expected = *self.expected.get(index)?;
        self.next += 1;

        let frame = self.read_frame(index, expected);
        self.failed = frame.is_err();
        Some(frame)
    }
}

/// Build a response body from already compressed payloads.
pub fn encode_response<'a, I>(payloads: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut body = Vec::new();
    for payload in payloads {
        let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        body.extend_from_slice(&len.to_be_bytes());
        body.extend_from_slice(payload);
    }
    body
}
