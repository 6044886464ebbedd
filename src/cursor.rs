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
//! Module for [`EntryCursor`], a forward-only reader of Tar entries.
//!
//! The cursor never seeks. It counts every byte it consumes, which makes the
//! header offset of an entry usable as a handle: a second cursor over a fresh
//! stream can skip to it.

use crate::entry::ArchiveEntry;
use crate::error::{MalformedError, Result, TarError};
use crate::header::{padded_size, parse_header, ParsedHeader, TypeFlag};
use crate::BLOCKSIZE;
use std::io::{self, ErrorKind, Read};

/// Name of the pseudo entry whose payload is the name of the next entry.
pub const LONG_LINK_NAME: &str = "././@LongLink";

/// Upper bound for the payload of a [`LONG_LINK_NAME`] entry.
pub const MAX_LONG_NAME_LEN: u64 = 64 * 1024;

/// Position of an [`EntryCursor`] relative to the entries of the archive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Ready to read the next header.
    BetweenEntries,
    /// Serving the payload of the entry returned last.
    InPayload,
    /// The end of the archive was reached or reading failed.
    Finished,
}

/// Reads [`ArchiveEntry`]s one after another from an uncompressed Tar
/// stream. GNU long names are resolved transparently.
#[derive(Debug)]
pub struct EntryCursor<R> {
    reader: R,
    state: CursorState,
    /// Bytes consumed from `reader` so far.
    bytes_read: u64,
    /// Payload bytes of the current entry not yet returned by `read`.
    remaining_payload: u64,
    /// Payload plus padding bytes in front of the next header.
    remaining_padding: u64,
    pending_long_name: Option<String>,
    pending_long_link: Option<String>,
    /// Entry read during construction, returned by the first `next_entry`.
    first: Option<ArchiveEntry>,
}

impl<R: Read> EntryCursor<R> {
    /// Wraps `reader` and reads the first header to make sure the stream is
    /// a Tar archive at all.
    ///
    /// # Errors
    /// [`MalformedError::NotTar`] if the first block is no valid header.
    pub fn new(reader: R) -> Result<Self> {
        let mut cursor = Self {
            reader,
            state: CursorState::BetweenEntries,
            bytes_read: 0,
            remaining_payload: 0,
            remaining_padding: 0,
            pending_long_name: None,
            pending_long_link: None,
            first: None,
        };
        cursor.first = cursor.guarded(Self::read_entry)?;
        if cursor.first.is_none() {
            // only possible if the archive ends after GNU pseudo entries
            return Err(MalformedError::NotTar.into());
        }
        Ok(cursor)
    }

    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// Total number of bytes consumed from the underlying stream.
    pub const fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Payload bytes of the current entry that were not read yet.
    pub const fn remaining_payload(&self) -> u64 {
        self.remaining_payload
    }

    /// Advances to the next entry, skipping whatever is left of the payload
    /// of the current one. Returns `None` at the end of the archive.
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        if let Some(entry) = self.first.take() {
            return Ok(Some(entry));
        }
        if self.state == CursorState::Finished {
            return Ok(None);
        }
        self.guarded(Self::read_entry)
    }

    /// Positions the cursor at the start of the payload of `target`.
    ///
    /// Returns `false` if `target` lies behind the cursor. The cursor is
    /// unchanged then and the caller has to start over with a fresh stream.
    pub fn skip_to_entry(&mut self, target: &ArchiveEntry) -> Result<bool> {
        let offset = target.header_offset();
        if let Some(first) = &self.first {
            if first.header_offset() == offset {
                self.first = None;
                self.state = CursorState::InPayload;
                return Ok(true);
            }
        }
        if offset < self.bytes_read {
            log::debug!(
                "entry at offset {offset} is behind the cursor at offset {}",
                self.bytes_read
            );
            return Ok(false);
        }
        self.first = None;
        self.guarded(|cursor| {
            cursor.skip(offset - cursor.bytes_read)?;
            cursor.remaining_payload = 0;
            cursor.remaining_padding = 0;
            cursor.pending_long_name = None;
            cursor.pending_long_link = None;
            cursor.state = CursorState::BetweenEntries;
            match cursor.read_entry()? {
                Some(entry) if entry.header_offset() == offset => Ok(true),
                _ => Err(MalformedError::EntryNotFound { offset }.into()),
            }
        })
    }

    /// Borrows the cursor as reader of the payload of the current entry.
    pub fn payload(&mut self) -> EntryReader<'_, R> {
        EntryReader { cursor: self }
    }

    /// Runs `op` and finishes the cursor if it fails. The position within the
    /// stream is unknown after an error.
    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = op(self);
        if result.is_err() {
            self.state = CursorState::Finished;
        }
        result
    }

    /// Reads headers until a real entry or the end of the archive is found.
    fn read_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        loop {
            self.skip(self.remaining_padding)?;
            self.remaining_payload = 0;
            self.remaining_padding = 0;
            self.state = CursorState::BetweenEntries;

            let offset = self.bytes_read;
            let mut block = [0; BLOCKSIZE];
            let got = read_block(&mut self.reader, &mut block)?;
            self.bytes_read += got as u64;
            if got == 0 {
                if offset == 0 {
                    return Err(MalformedError::NotTar.into());
                }
                log::warn!("Reached end of Tar archive data at offset {offset} without finding zero/end blocks!");
                self.state = CursorState::Finished;
                return Ok(None);
            }
            if got < BLOCKSIZE {
                return Err(MalformedError::Truncated {
                    offset,
                    expected: BLOCKSIZE as u64,
                    actual: got as u64,
                }
                .into());
            }

            let mut entry = match parse_header(&block, offset) {
                Ok(ParsedHeader::Entry(entry)) => entry,
                Ok(ParsedHeader::EndMarker) if offset == 0 => {
                    return Err(MalformedError::NotTar.into());
                }
                Ok(ParsedHeader::EndMarker) => {
                    log::debug!("End of Tar archive at offset {offset}");
                    self.state = CursorState::Finished;
                    return Ok(None);
                }
                Err(e) if offset == 0 => {
                    log::debug!("first header is invalid: {e}");
                    return Err(MalformedError::NotTar.into());
                }
                Err(e) => return Err(e.into()),
            };

            self.remaining_payload = entry.size();
            self.remaining_padding = padded_size(entry.size());

            if entry.name() == LONG_LINK_NAME {
                let long_name = self.read_long_name(&entry)?;
                if entry.entry_type().type_flag() == Ok(TypeFlag::GNULONGLINK) {
                    log::debug!("long link name at offset {offset}: {long_name}");
                    self.pending_long_link = Some(long_name);
                } else {
                    log::debug!("long name at offset {offset}: {long_name}");
                    self.pending_long_name = Some(long_name);
                }
                continue;
            }

            if let Some(name) = self.pending_long_name.take() {
                entry.set_name(name);
            }
            if let Some(link_name) = self.pending_long_link.take() {
                entry.set_link_name(link_name);
            }
            self.state = CursorState::InPayload;
            return Ok(Some(entry));
        }
    }

    /// Consumes the payload of a `././@LongLink` pseudo entry as string.
    fn read_long_name(&mut self, entry: &ArchiveEntry) -> Result<String> {
        let size = entry.size();
        if size > MAX_LONG_NAME_LEN {
            return Err(MalformedError::LongNameTooLong {
                offset: entry.header_offset(),
                size,
            }
            .into());
        }
        let offset = self.bytes_read;
        let mut bytes = Vec::new();
        let got = (&mut self.reader).take(size).read_to_end(&mut bytes)? as u64;
        self.bytes_read += got;
        if got < size {
            return Err(MalformedError::Truncated {
                offset,
                expected: size,
                actual: got,
            }
            .into());
        }
        self.remaining_payload = 0;
        self.remaining_padding -= size;

        let end = memchr::memchr(0, &bytes).unwrap_or(bytes.len());
        bytes.truncate(end);
        String::from_utf8(bytes).map_err(|_| {
            TarError::from(MalformedError::InvalidUtf8 {
                field: "long name",
                offset: entry.header_offset(),
            })
        })
    }

    /// Discards exactly `count` bytes.
    fn skip(&mut self, count: u64) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let offset = self.bytes_read;
        let skipped = io::copy(&mut (&mut self.reader).take(count), &mut io::sink())?;
        self.bytes_read += skipped;
        if skipped < count {
            return Err(MalformedError::Truncated {
                offset,
                expected: count,
                actual: skipped,
            }
            .into());
        }
        Ok(())
    }
}

/// Reads at most the remaining payload of the current entry. Returns `Ok(0)`
/// once the payload is exhausted; it never advances to the next entry.
impl<R: Read> Read for EntryCursor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.state != CursorState::InPayload || self.first.is_some() {
            return Ok(0);
        }
        let len = usize::try_from(self.remaining_payload)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        if len == 0 {
            return Ok(0);
        }
        let got = self.reader.read(&mut buf[..len])?;
        if got == 0 {
            let err = MalformedError::Truncated {
                offset: self.bytes_read,
                expected: self.remaining_payload,
                actual: 0,
            };
            self.state = CursorState::Finished;
            return Err(TarError::from(err).into());
        }
        self.bytes_read += got as u64;
        self.remaining_payload -= got as u64;
        self.remaining_padding -= got as u64;
        debug_assert!(self.remaining_padding >= self.remaining_payload);
        Ok(got)
    }
}

/// Payload of one entry, borrowed from an [`EntryCursor`]. Reads end after
/// [`ArchiveEntry::size`] bytes.
#[derive(Debug)]
pub struct EntryReader<'a, R> {
    cursor: &'a mut EntryCursor<R>,
}

impl<R> EntryReader<'_, R> {
    /// Bytes left until the end of the payload.
    pub const fn remaining(&self) -> u64 {
        self.cursor.remaining_payload
    }
}

impl<R: Read> Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

/// Fills `buf` as far as the stream allows and returns the number of bytes
/// read. Less than `buf.len()` means the stream ended.
fn read_block(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryType;
    use crate::header::test_utils::{archive, header, push_payload};
    use std::io::Cursor;

    /// Hands out at most a few bytes per `read` call.
    struct Trickle<R>(R, usize);

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.1 = self.1 % 7 + 1;
            let len = buf.len().min(self.1);
            self.0.read(&mut buf[..len])
        }
    }

    fn hello_archive() -> Vec<u8> {
        archive(&[("a.txt", b"hello")])
    }

    fn collect<R: Read>(cursor: &mut EntryCursor<R>) -> Vec<ArchiveEntry> {
        let mut entries = Vec::new();
        while let Some(entry) = cursor.next_entry().unwrap() {
            entries.push(entry);
        }
        entries
    }

    fn malformed(result: Result<impl core::fmt::Debug>) -> MalformedError {
        match result {
            Err(TarError::Malformed(e)) => e,
            other => panic!("expected a malformed archive, got {other:?}"),
        }
    }

    #[test]
    fn test_single_short_file() {
        let data = hello_archive();
        assert_eq!(data.len(), 4 * BLOCKSIZE);
        let mut cursor = EntryCursor::new(data.as_slice()).unwrap();
        let entry = cursor.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "a.txt");
        assert_eq!(entry.size(), 5);
        assert_eq!(entry.header_offset(), 0);

        let mut payload = Vec::new();
        cursor.payload().read_to_end(&mut payload).unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(cursor.next_entry().unwrap(), None);
        assert_eq!(cursor.state(), CursorState::Finished);
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_read_is_bounded_to_entry() {
        let data = archive(&[("a.txt", b"hello"), ("b.txt", b"world!")]);
        let mut cursor = EntryCursor::new(Trickle(data.as_slice(), 0)).unwrap();
        // nothing to read before the first entry was handed out
        assert_eq!(cursor.read(&mut [0; 16]).unwrap(), 0);
        cursor.next_entry().unwrap().unwrap();

        let mut buf = [0; 64];
        let mut payload = Vec::new();
        loop {
            let n = cursor.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            payload.extend_from_slice(&buf[..n]);
        }
        assert_eq!(payload, b"hello");
        assert_eq!(cursor.remaining_payload(), 0);
        // read does not move on to "b.txt"
        assert_eq!(cursor.read(&mut buf).unwrap(), 0);

        let entry = cursor.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "b.txt");
        let mut payload = String::new();
        cursor.read_to_string(&mut payload).unwrap();
        assert_eq!(payload, "world!");
    }

    #[test]
    fn test_partial_read_then_next_entry() {
        let data = archive(&[("a.txt", &[b'x'; 1000]), ("b.txt", b"b")]);
        let mut cursor = EntryCursor::new(data.as_slice()).unwrap();
        cursor.next_entry().unwrap().unwrap();
        let mut buf = [0; 10];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(cursor.payload().remaining(), 990);
        let entry = cursor.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "b.txt");
        assert_eq!(entry.header_offset(), 1536);
    }

    #[test]
    fn test_padding_invariant() {
        let data = include_bytes!("../tests/gnu_tar_gnu.tar");
        let mut cursor = EntryCursor::new(Trickle(&data[..], 0)).unwrap();
        let entries = collect(&mut cursor);
        let names = entries.iter().map(ArchiveEntry::name).collect::<Vec<_>>();
        assert_eq!(
            names,
            ["bye_world_513b.txt", "hello_world_513b.txt", "hello_world.txt"]
        );
        for pair in entries.windows(2) {
            assert_eq!(pair[0].next_header_offset(), pair[1].header_offset());
        }
    }

    #[test]
    fn test_gnu_long_name() {
        let data = include_bytes!("../tests/gnu_tar_longname.tar");
        let mut cursor = EntryCursor::new(&data[..]).unwrap();
        assert_eq!(cursor.next_entry().unwrap().unwrap().name(), "hello_world.txt");

        let entry = cursor.next_entry().unwrap().unwrap();
        let expected = format!(
            "{}a_file_with_a_rather_long_name.txt",
            "deeply_nested_directory_name/".repeat(4)
        );
        assert_eq!(entry.name(), expected);
        assert_eq!(entry.size(), 18);
        // own header, after the pseudo entry and its one payload block
        assert_eq!(entry.header_offset(), 2048);

        let mut payload = String::new();
        cursor.read_to_string(&mut payload).unwrap();
        assert_eq!(payload, "long name payload\n");
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_gnu_long_link_name() {
        let long_target = "t".repeat(120);
        let mut data = Vec::new();
        data.extend_from_slice(&header(LONG_LINK_NAME, long_target.len() as u64 + 1, b'K'));
        push_payload(&mut data, format!("{long_target}\0").as_bytes());
        data.extend_from_slice(&header("link", 0, b'2'));
        data.resize(data.len() + 2 * BLOCKSIZE, 0);

        let mut cursor = EntryCursor::new(data.as_slice()).unwrap();
        let entry = cursor.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "link");
        assert_eq!(entry.link_name(), Some(long_target.as_str()));
        assert_eq!(entry.entry_type(), EntryType::Other(b'2'));
        assert_eq!(entry.header_offset(), 1024);
    }

    #[test]
    fn test_oversized_long_name() {
        let mut data = archive(&[("a.txt", b"hello")]);
        data.truncate(1024);
        data.extend_from_slice(&header(LONG_LINK_NAME, 0o77777777777, b'L'));
        data.resize(data.len() + 2 * BLOCKSIZE, 0);

        let mut cursor = EntryCursor::new(data.as_slice()).unwrap();
        cursor.next_entry().unwrap().unwrap();
        assert_eq!(
            malformed(cursor.next_entry()),
            MalformedError::LongNameTooLong {
                offset: 1024,
                size: 0o77777777777
            }
        );
        assert_eq!(cursor.state(), CursorState::Finished);
    }

    #[test]
    fn test_directories() {
        let data = include_bytes!("../tests/gnu_tar_dirs.tar");
        let entries = collect(&mut EntryCursor::new(&data[..]).unwrap());
        let summary = entries
            .iter()
            .map(|e| (e.name(), e.entry_type(), e.size()))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            [
                ("dir/", EntryType::Directory, 0),
                ("dir/sub/", EntryType::Directory, 0),
                ("dir/sub/nested.txt", EntryType::File, 7),
            ]
        );
    }

    #[test]
    fn test_skip_to_entry() {
        let data = include_bytes!("../tests/gnu_tar_gnu.tar");
        let entries = collect(&mut EntryCursor::new(&data[..]).unwrap());

        let mut cursor = EntryCursor::new(&data[..]).unwrap();
        assert!(cursor.skip_to_entry(&entries[1]).unwrap());
        assert!(cursor.skip_to_entry(&entries[2]).unwrap());
        let mut payload = String::new();
        cursor.read_to_string(&mut payload).unwrap();
        assert_eq!(payload, "Hello World\n");

        // backwards is refused and leaves the cursor alone
        let position = cursor.bytes_read();
        assert!(!cursor.skip_to_entry(&entries[0]).unwrap());
        assert_eq!(cursor.bytes_read(), position);
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_skip_to_first_entry() {
        let data = hello_archive();
        let entry = collect(&mut EntryCursor::new(data.as_slice()).unwrap()).remove(0);
        let mut cursor = EntryCursor::new(data.as_slice()).unwrap();
        assert!(cursor.skip_to_entry(&entry).unwrap());
        let mut payload = Vec::new();
        cursor.read_to_end(&mut payload).unwrap();
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_skip_to_long_named_entry() {
        let data = include_bytes!("../tests/gnu_tar_longname.tar");
        let entries = collect(&mut EntryCursor::new(&data[..]).unwrap());
        let mut cursor = EntryCursor::new(&data[..]).unwrap();
        assert!(cursor.skip_to_entry(&entries[1]).unwrap());
        let mut payload = String::new();
        cursor.read_to_string(&mut payload).unwrap();
        assert_eq!(payload, "long name payload\n");
    }

    #[test]
    fn test_skip_to_bogus_offset() {
        let data = archive(&[("a.txt", b"hello"), ("b.txt", b"b")]);
        let bogus = ArchiveEntry::new("x".into(), EntryType::File, 0, 0, 0, 4096);
        let mut cursor = EntryCursor::new(data.as_slice()).unwrap();
        assert!(matches!(
            malformed(cursor.skip_to_entry(&bogus)),
            MalformedError::EntryNotFound { offset: 4096 } | MalformedError::Truncated { .. }
        ));
        assert_eq!(cursor.state(), CursorState::Finished);
    }

    #[test]
    fn test_truncated_in_padding() {
        let data = hello_archive();
        let mut cursor = EntryCursor::new(&data[..600]).unwrap();
        let entry = cursor.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "a.txt");
        let mut payload = Vec::new();
        cursor.read_to_end(&mut payload).unwrap();
        assert_eq!(payload, b"hello");

        assert!(matches!(
            malformed(cursor.next_entry()),
            MalformedError::Truncated { offset: 517, .. }
        ));
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_truncated_in_header() {
        let data = hello_archive();
        assert_eq!(
            malformed(EntryCursor::new(&data[..300])),
            MalformedError::Truncated {
                offset: 0,
                expected: 512,
                actual: 300
            }
        );
    }

    #[test]
    fn test_truncated_in_payload() {
        let data = archive(&[("a.txt", &[b'x'; 100])]);
        let mut cursor = EntryCursor::new(&data[..550]).unwrap();
        cursor.next_entry().unwrap().unwrap();
        let err = cursor.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_missing_end_marker() {
        let data = hello_archive();
        let mut cursor = EntryCursor::new(&data[..1024]).unwrap();
        assert_eq!(collect(&mut cursor).len(), 1);
    }

    #[test]
    fn test_not_a_tar_archive() {
        assert_eq!(malformed(EntryCursor::new(&b""[..])), MalformedError::NotTar);
        assert_eq!(
            malformed(EntryCursor::new(&[0u8; 2 * BLOCKSIZE][..])),
            MalformedError::NotTar
        );
        let text = "this is not a tar archive\n".repeat(40);
        assert_eq!(
            malformed(EntryCursor::new(text.as_bytes())),
            MalformedError::NotTar
        );
    }

    #[test]
    fn test_corrupt_second_header() {
        let mut data = archive(&[("a.txt", b"hello"), ("b.txt", b"b")]);
        data[1024 + 3] ^= 0x20;
        let mut cursor = EntryCursor::new(Cursor::new(data)).unwrap();
        cursor.next_entry().unwrap().unwrap();
        assert!(matches!(
            malformed(cursor.next_entry()),
            MalformedError::ChecksumMismatch { offset: 1024, .. }
        ));
    }
}
