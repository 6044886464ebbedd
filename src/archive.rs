/*
MIT License

Copyright (c) 2021 Philipp Schuster

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
//! Module for [`Archive`].

use crate::cursor::{EntryCursor, EntryReader};
use crate::entry::ArchiveEntry;
use crate::error::{MalformedError, Result, TarError};
use crate::source::{ByteSource, Decoder, FileSource};
use core::fmt::{Debug, Formatter};
use std::io;
use std::path::Path;

type Cursor<S> = EntryCursor<Decoder<<S as ByteSource>::Reader>>;

/// A Tar archive, optionally gzip-compressed, read from a [`ByteSource`].
///
/// Two independent streams are used: one to catalog the entries and one to
/// serve payloads. Both only move forward. The payload stream is reopened
/// from the start whenever an entry before its current position is asked for.
pub struct Archive<S: ByteSource = FileSource> {
    source: S,
    catalog: Option<Cursor<S>>,
    /// Every entry the catalog cursor has returned so far.
    seen: Vec<ArchiveEntry>,
    catalog_error: Option<TarError>,
    access: Option<Cursor<S>>,
    open_count: usize,
    closed: bool,
}

impl Archive<FileSource> {
    /// Opens the archive at `path`. Gzip compression is detected from the
    /// content, not from the file name.
    ///
    /// # Errors
    /// Fails if the file can't be read or doesn't start with a Tar header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(FileSource::new(path))
    }
}

impl<S: ByteSource> Archive<S> {
    /// Opens `source` and verifies the first header.
    pub fn from_source(source: S) -> Result<Self> {
        let mut archive = Self {
            source,
            catalog: None,
            seen: Vec::new(),
            catalog_error: None,
            access: None,
            open_count: 0,
            closed: false,
        };
        archive.catalog = Some(archive.open_cursor()?);
        Ok(archive)
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    /// How often the source was opened.
    pub const fn open_count(&self) -> usize {
        self.open_count
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Iterates over the entries of the archive.
    ///
    /// All calls share one forward-only cursor: a second call continues where
    /// the first one stopped, so iterate once. Use [`Self::catalog`] for a
    /// list that can be walked repeatedly.
    pub fn entries(&mut self) -> Entries<'_, S> {
        Entries { archive: self }
    }

    /// Reads all remaining headers and returns every entry of the archive,
    /// including those already returned by [`Self::entries`].
    ///
    /// # Errors
    /// Fails if any header could not be read, also on later calls.
    pub fn catalog(&mut self) -> Result<&[ArchiveEntry]> {
        for entry in self.entries() {
            entry?;
        }
        match &self.catalog_error {
            Some(err) => Err(err.duplicate()),
            None => Ok(&self.seen),
        }
    }

    /// Returns a reader of the payload of `entry`, which must come from this
    /// archive. The reader ends after [`ArchiveEntry::size`] bytes.
    ///
    /// Entries requested in archive order are served from one stream. Asking
    /// for an earlier entry reopens the source and skips forward from byte 0.
    pub fn get_input_stream(
        &mut self,
        entry: &ArchiveEntry,
    ) -> Result<EntryReader<'_, Decoder<S::Reader>>> {
        let mut reusable = None;
        if let Some(mut cursor) = self.access.take() {
            if cursor.skip_to_entry(entry)? {
                reusable = Some(cursor);
            } else {
                log::debug!(
                    "reopening archive to read `{}` at offset {}",
                    entry.name(),
                    entry.header_offset()
                );
            }
        }

        let cursor = match reusable {
            Some(cursor) => cursor,
            None => {
                let mut cursor = self.open_cursor()?;
                if !cursor.skip_to_entry(entry)? {
                    return Err(MalformedError::EntryNotFound {
                        offset: entry.header_offset(),
                    }
                    .into());
                }
                cursor
            }
        };
        Ok(self.access.insert(cursor).payload())
    }

    /// Releases both underlying streams. Calling it again has no effect.
    pub fn close(&mut self) {
        if !self.closed {
            log::debug!("closing archive after {} opens", self.open_count);
        }
        self.catalog = None;
        self.access = None;
        self.closed = true;
    }

    fn open_cursor(&mut self) -> Result<Cursor<S>> {
        if self.closed {
            return Err(io::Error::other("archive is closed").into());
        }
        let reader = self.source.open()?;
        self.open_count += 1;
        EntryCursor::new(Decoder::new(reader)?)
    }
}

impl<S: ByteSource> Debug for Archive<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Archive")
            .field("entries_seen", &self.seen.len())
            .field("catalog_error", &self.catalog_error)
            .field("open_count", &self.open_count)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Iterator over the entries of an [`Archive`]. Each iteration step reads
/// the next header from the shared catalog cursor. Iteration stops after the
/// first error.
pub struct Entries<'a, S: ByteSource> {
    archive: &'a mut Archive<S>,
}

impl<S: ByteSource> Debug for Entries<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entries")
            .field("archive", &self.archive)
            .finish()
    }
}

impl<S: ByteSource> Iterator for Entries<'_, S> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.archive.catalog.as_mut()?;
        match cursor.next_entry() {
            Ok(Some(entry)) => {
                self.archive.seen.push(entry.clone());
                Some(Ok(entry))
            }
            Ok(None) => None,
            Err(err) => {
                self.archive.catalog_error = Some(err.duplicate());
                Some(Err(err))
            }
        }
    }
}
