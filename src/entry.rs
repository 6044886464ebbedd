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
//! Module for [`ArchiveEntry`].

use crate::header::{padded_size, InvalidTypeFlagError, TypeFlag, TypeFlagRaw};
use crate::{ModeFlags, BLOCKSIZE};
use core::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Coarse kind of an [`ArchiveEntry`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// A regular file (type flag `0` or NULL).
    File,
    /// A directory (type flag `5`).
    Directory,
    /// Anything else. Holds the raw type flag.
    Other(u8),
}

impl EntryType {
    /// The [`TypeFlag`] this type was read from. Legacy NULL flags of
    /// regular files report as [`TypeFlag::REGTYPE`].
    pub fn type_flag(self) -> Result<TypeFlag, InvalidTypeFlagError> {
        match self {
            Self::File => Ok(TypeFlag::REGTYPE),
            Self::Directory => Ok(TypeFlag::DIRTYPE),
            Self::Other(flag) => TypeFlagRaw(flag).try_to_type_flag(),
        }
    }
}

impl From<TypeFlagRaw> for EntryType {
    fn from(raw: TypeFlagRaw) -> Self {
        match raw.try_to_type_flag() {
            Ok(flag) if flag.is_regular_file() => Self::File,
            Ok(TypeFlag::DIRTYPE) => Self::Directory,
            _ => Self::Other(raw.as_byte()),
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
            Self::Other(flag) if flag.is_ascii_graphic() => write!(f, "other ('{}')", *flag as char),
            Self::Other(flag) => write!(f, "other ({flag:#04x})"),
        }
    }
}

/// Describes one entry of an archive. Entries do not hold payload data; the
/// [`ArchiveEntry::header_offset`] is the handle to read it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveEntry {
    name: String,
    link_name: Option<String>,
    entry_type: EntryType,
    mode: u32,
    mod_time: u64,
    size: u64,
    header_offset: u64,
}

impl ArchiveEntry {
    pub(crate) fn new(
        name: String,
        entry_type: EntryType,
        mode: u32,
        mod_time: u64,
        size: u64,
        header_offset: u64,
    ) -> Self {
        Self {
            name,
            link_name: None,
            entry_type,
            mode,
            mod_time,
            size,
            header_offset,
        }
    }

    pub(crate) fn with_link_name(mut self, link_name: Option<String>) -> Self {
        self.link_name = link_name;
        self
    }

    /// Replaces the name, used for GNU long names.
    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Replaces the link name, used for GNU long link names.
    pub(crate) fn set_link_name(&mut self, link_name: String) {
        self.link_name = Some(link_name);
    }

    /// Full path of the entry inside the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// [`Self::name`] as path.
    pub fn path(&self) -> &Path {
        Path::new(&self.name)
    }

    /// Target of a hard or symbolic link.
    pub fn link_name(&self) -> Option<&str> {
        self.link_name.as_deref()
    }

    pub const fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    /// Permission bits as stored in the header.
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// [`Self::mode`] as flags. Bits beyond the permission bits are dropped.
    pub const fn mode_flags(&self) -> ModeFlags {
        ModeFlags::from_bits_truncate(self.mode)
    }

    /// Modification time in seconds since the epoch.
    pub const fn mod_time(&self) -> u64 {
        self.mod_time
    }

    pub fn modified(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.mod_time)
    }

    /// Payload length in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Byte offset of the header block of this entry in the decompressed
    /// stream. Always a multiple of the block size.
    pub const fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// Offset of the block following the payload and its padding.
    pub const fn next_header_offset(&self) -> u64 {
        self.header_offset + BLOCKSIZE as u64 + padded_size(self.size)
    }
}

impl Display for ArchiveEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} ({}, {} bytes, mode {:o})",
            self.name, self.entry_type, self.size, self.mode
        )?;
        if let Some(link_name) = &self.link_name {
            write!(f, " -> {link_name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(size: u64, header_offset: u64) -> ArchiveEntry {
        ArchiveEntry::new("a.txt".into(), EntryType::File, 0o4755, 0, size, header_offset)
    }

    #[test]
    fn test_next_header_offset() {
        assert_eq!(entry(0, 0).next_header_offset(), 512);
        assert_eq!(entry(5, 0).next_header_offset(), 1024);
        assert_eq!(entry(512, 1024).next_header_offset(), 2048);
        assert_eq!(entry(513, 1024).next_header_offset(), 2560);
    }

    #[test]
    fn test_mode_flags() {
        let flags = entry(0, 0).mode_flags();
        assert!(flags.contains(ModeFlags::SetUID | ModeFlags::OwnerExec | ModeFlags::OthersRead));
        assert!(!flags.contains(ModeFlags::GroupWrite));
    }

    #[test]
    fn test_entry_type_from_flag() {
        assert_eq!(EntryType::from(TypeFlagRaw(b'0')), EntryType::File);
        assert_eq!(EntryType::from(TypeFlagRaw(0)), EntryType::File);
        assert_eq!(EntryType::from(TypeFlagRaw(b'5')), EntryType::Directory);
        assert_eq!(EntryType::from(TypeFlagRaw(b'2')), EntryType::Other(b'2'));
        assert_eq!(EntryType::from(TypeFlagRaw(0xee)), EntryType::Other(0xee));
        assert_eq!(EntryType::Other(b'2').type_flag(), Ok(TypeFlag::SYMTYPE));
        assert!(EntryType::Other(0xee).type_flag().is_err());
    }

    #[test]
    fn test_display() {
        let link = ArchiveEntry::new("l".into(), EntryType::Other(b'2'), 0o777, 0, 0, 0)
            .with_link_name(Some("target".into()));
        assert_eq!(link.to_string(), "l (other ('2'), 0 bytes, mode 777) -> target");
        assert_eq!(
            EntryType::Other(0).to_string(),
            "other (0x00)",
        );
    }
}
