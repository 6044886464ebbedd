/*
MIT License

Copyright (c) 2023 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/
//! Error types of the crate.

use std::io;

/// The archive bytes violate the Tar format. Reading the current entry or
/// catalog cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MalformedError {
    /// The first block is not a Tar header at all.
    #[error("not in tar format")]
    NotTar,

    /// The checksum stored in a header does not match its content.
    #[error("header checksum mismatch at offset {offset}: stored {expected:#o}, computed {actual:#o}")]
    ChecksumMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// A numeric header field holds something other than octal digits.
    #[error("invalid octal number in field `{field}` of header at offset {offset}")]
    InvalidNumber { field: &'static str, offset: u64 },

    /// A textual header field is not valid UTF-8.
    #[error("invalid UTF-8 in field `{field}` of header at offset {offset}")]
    InvalidUtf8 { field: &'static str, offset: u64 },

    /// The stream ended before a header, payload or skip was complete.
    #[error("archive truncated at offset {offset}: expected {expected} more bytes, got {actual}")]
    Truncated {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// A GNU long name is larger than any sane path.
    #[error("long name of {size} bytes in header at offset {offset} exceeds the limit")]
    LongNameTooLong { offset: u64, size: u64 },

    /// Random access did not find a header at the recorded offset.
    #[error("no entry header at offset {offset}")]
    EntryNotFound { offset: u64 },

    /// The input is gzip-compressed but the `gzip` feature is disabled.
    #[error("archive is gzip-compressed, but gzip support is not compiled in")]
    GzipDisabled,
}

/// Errors returned by archive operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TarError {
    /// The underlying byte source failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The archive content is invalid.
    #[error("malformed archive: {0}")]
    Malformed(#[from] MalformedError),

    /// An entry would be extracted outside of the destination directory.
    #[error("entry `{name}` escapes the destination directory")]
    PathTraversal { name: String },
}

impl TarError {
    /// The [`MalformedError`], if this is one.
    #[must_use]
    pub const fn as_malformed(&self) -> Option<&MalformedError> {
        match self {
            Self::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl TarError {
    /// A copy of this error for reporting it a second time. I/O errors keep
    /// their kind and message only.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::Malformed(e) => Self::Malformed(e.clone()),
            Self::PathTraversal { name } => Self::PathTraversal { name: name.clone() },
        }
    }
}

/// Payload reads report [`MalformedError`]s through [`io::Error`]; they are
/// unwrapped again here.
impl From<io::Error> for TarError {
    fn from(err: io::Error) -> Self {
        match err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MalformedError>())
        {
            Some(malformed) => Self::Malformed(malformed.clone()),
            None => Self::Io(err),
        }
    }
}

impl From<TarError> for io::Error {
    fn from(err: TarError) -> Self {
        match err {
            TarError::Io(e) => e,
            TarError::Malformed(e @ MalformedError::Truncated { .. }) => {
                io::Error::new(io::ErrorKind::UnexpectedEof, e)
            }
            TarError::Malformed(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            e @ TarError::PathTraversal { .. } => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}

pub type Result<T> = core::result::Result<T, TarError>;
