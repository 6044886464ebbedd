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
//! TAR header definition taken from <https://www.gnu.org/software/tar/manual/html_node/Standard.html>.
//! A Tar-archive is a collection of 512-byte sized blocks. Unfortunately there are several
//! TAR-like archive specifications. An Overview can be found here:
//! <https://www.gnu.org/software/tar/manual/html_node/Formats.html#Formats>
//!
//! This module decodes one header block into an [`ArchiveEntry`]. It knows
//! nothing about the stream the block came from; the caller passes the offset.

#![allow(non_upper_case_globals)]

use crate::entry::{ArchiveEntry, EntryType};
use crate::error::MalformedError;
use crate::{TarFormatOctal, TarFormatString, BLOCKSIZE, NAME_LEN, PREFIX_LEN};
use core::fmt::{Debug, Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Offset of the checksum field inside a header block.
const CHECKSUM_OFFSET: usize = 148;
/// Length of the checksum field.
const CHECKSUM_LEN: usize = 8;
/// Magic and version of headers written by GNU tar (`--format=gnu|oldgnu`).
/// These reuse the ustar prefix area for other fields.
const GNU_MAGIC: &[u8; 8] = b"ustar  \0";

/// Header of the TAR format as specified by POSIX (POSIX 1003.1-1990.
/// "New" (version?) GNU Tar versions use this archive format by default.
/// (<https://www.gnu.org/software/tar/manual/html_node/Formats.html#Formats>).
///
/// Each file is started by such a header, that describes the size and
/// the file name. After that, the file content stands in chunks of 512 bytes.
/// The number of bytes can be derived from the file size.
///
/// This is also mostly compatible with the "Ustar"-header and the "GNU format".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C, packed)]
pub struct PosixHeader {
    pub name: TarFormatString<NAME_LEN>,
    pub mode: TarFormatOctal<8>,
    pub uid: TarFormatOctal<8>,
    pub gid: TarFormatOctal<8>,
    // confusing; size is stored as ASCII string
    pub size: TarFormatOctal<12>,
    pub mtime: TarFormatOctal<12>,
    pub cksum: TarFormatOctal<8>,
    pub typeflag: TypeFlagRaw,
    /// Name. There is always a null byte, therefore
    /// the max len is 99.
    pub linkname: TarFormatString<NAME_LEN>,
    pub magic: TarFormatString<6>,
    pub version: TarFormatString<2>,
    /// Username. There is always a null byte, therefore
    /// the max len is N-1.
    pub uname: TarFormatString<32>,
    /// Groupname. There is always a null byte, therefore
    /// the max len is N-1.
    pub gname: TarFormatString<32>,
    pub dev_major: TarFormatOctal<8>,
    pub dev_minor: TarFormatOctal<8>,
    pub prefix: TarFormatString<PREFIX_LEN>,
    // padding => to BLOCKSIZE bytes
    pub _pad: [u8; 12],
}

const _: () = assert!(core::mem::size_of::<PosixHeader>() == BLOCKSIZE);

impl PosixHeader {
    /// Views a raw block as header.
    pub const fn from_block(block: &[u8; BLOCKSIZE]) -> &Self {
        // SAFETY: the struct is packed (alignment 1), exactly BLOCKSIZE bytes
        // long and consists of byte arrays only, so every bit pattern is valid.
        unsafe { &*(block as *const [u8; BLOCKSIZE]).cast::<Self>() }
    }

    /// Returns the number of blocks that are required to read the whole file
    /// content. Returns `None`, if the file size can't be parsed from the
    /// header.
    pub fn payload_block_count(&self) -> Option<u64> {
        let parsed_size = self.size.as_number::<u64>()?;
        Some(parsed_size.div_ceil(BLOCKSIZE as u64))
    }

    /// Whether the header carries the GNU magic. GNU headers store access
    /// and change times where ustar keeps the name prefix.
    pub fn is_gnu(&self) -> bool {
        self.magic.as_raw()[..] == GNU_MAGIC[..6] && self.version.as_raw()[..] == GNU_MAGIC[6..]
    }
}

/// Size of the payload rounded up to the next block boundary.
pub const fn padded_size(size: u64) -> u64 {
    size.div_ceil(BLOCKSIZE as u64) * BLOCKSIZE as u64
}

/// A Tar archive is terminated, if an end-of-archive entry, which consists
/// of two 512 blocks of zero bytes, is found.
pub fn is_zero_block(block: &[u8; BLOCKSIZE]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Computes the header checksum: the unsigned sum of all bytes of the block,
/// where the checksum field itself counts as eight ASCII spaces.
pub fn checksum(block: &[u8; BLOCKSIZE]) -> u32 {
    let (head, rest) = block.split_at(CHECKSUM_OFFSET);
    let tail = &rest[CHECKSUM_LEN..];
    let sum = |bytes: &[u8]| bytes.iter().map(|&b| u32::from(b)).sum::<u32>();
    sum(head) + u32::from(b' ') * CHECKSUM_LEN as u32 + sum(tail)
}

/// Result of decoding one header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedHeader {
    /// A regular header describing an entry.
    Entry(ArchiveEntry),
    /// An all-zero block, which terminates the archive.
    EndMarker,
}

/// Decodes the header block found at `offset` of the (decompressed) stream
/// and verifies its checksum.
///
/// The name is `prefix/name` if a ustar prefix is present. GNU long names are
/// not resolved here, the `././@LongLink` pseudo entry is returned as is.
pub fn parse_header(block: &[u8; BLOCKSIZE], offset: u64) -> Result<ParsedHeader, MalformedError> {
    debug_assert_eq!(offset % BLOCKSIZE as u64, 0);
    if is_zero_block(block) {
        return Ok(ParsedHeader::EndMarker);
    }

    let hdr = PosixHeader::from_block(block);
    let invalid_number = |field| MalformedError::InvalidNumber { field, offset };
    let invalid_utf8 = |field| MalformedError::InvalidUtf8 { field, offset };

    let expected = hdr
        .cksum
        .as_number::<u32>()
        .ok_or_else(|| invalid_number("checksum"))?;
    let actual = checksum(block);
    if expected != actual {
        return Err(MalformedError::ChecksumMismatch {
            offset,
            expected,
            actual,
        });
    }

    let mut name = hdr
        .name
        .as_str()
        .map_err(|_| invalid_utf8("name"))?
        .to_string();
    if !hdr.is_gnu() && !hdr.prefix.is_empty() {
        let prefix = hdr.prefix.as_str().map_err(|_| invalid_utf8("prefix"))?;
        name = format!("{prefix}/{name}");
    }

    let link_name = if hdr.linkname.is_empty() {
        None
    } else {
        let link_name = hdr.linkname.as_str().map_err(|_| invalid_utf8("linkname"))?;
        Some(link_name.to_string())
    };

    let mode = hdr.mode.as_number::<u32>().ok_or_else(|| invalid_number("mode"))?;
    let size = hdr.size.as_number::<u64>().ok_or_else(|| invalid_number("size"))?;
    let mod_time = parse_mtime(hdr, offset);

    let mut entry_type = EntryType::from(hdr.typeflag);
    if entry_type == EntryType::File && name.ends_with('/') {
        entry_type = EntryType::Directory;
    }

    let entry = ArchiveEntry::new(name, entry_type, mode, mod_time, size, offset)
        .with_link_name(link_name);
    log::trace!("header at offset {offset}: {entry:?}");
    Ok(ParsedHeader::Entry(entry))
}

/// Modification time in seconds since the epoch. Falls back to the current
/// time if the field is absent or unreadable.
fn parse_mtime(hdr: &PosixHeader, offset: u64) -> u64 {
    let mtime = hdr.mtime;
    if mtime.as_inner().is_blank() {
        return now();
    }
    mtime.as_number::<u64>().unwrap_or_else(|| {
        log::warn!("unreadable mtime in header at offset {offset}, using current time");
        now()
    })
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq)]
pub struct InvalidTypeFlagError(u8);

impl Display for InvalidTypeFlagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{:x} is not a valid TypeFlag", self.0))
    }
}

impl std::error::Error for InvalidTypeFlagError {}

#[derive(Copy, Clone, PartialOrd, PartialEq, Eq)]
pub struct TypeFlagRaw(pub(crate) u8);

impl TypeFlagRaw {
    /// Tries to parse the underlying value as [`TypeFlag`]. This fails if the
    /// Tar file is corrupt and the type is invalid.
    pub fn try_to_type_flag(self) -> Result<TypeFlag, InvalidTypeFlagError> {
        TypeFlag::try_from(self)
    }

    /// The byte as stored in the header.
    pub const fn as_byte(self) -> u8 {
        self.0
    }
}

impl Debug for TypeFlagRaw {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.try_to_type_flag(), f)
    }
}

/// Describes the kind of payload, that follows after a
/// [`PosixHeader`]. The properties of this payload are
/// described inside the header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeFlag {
    /// Represents a regular file. For backward compatibility, a regular
    /// file whose name ends with a slash is a directory.
    REGTYPE = b'0',
    /// Legacy (v7) spelling of [`TypeFlag::REGTYPE`].
    AREGTYPE = b'\0',
    /// A file linked to another file, of any type, previously archived.
    /// The linked-to name is specified in the linkname field.
    LINK = b'1',
    /// A symbolic link to another file. The linked-to name is specified in
    /// the linkname field.
    SYMTYPE = b'2',
    /// Character special file.
    CHRTYPE = b'3',
    /// Block special file.
    BLKTYPE = b'4',
    /// A directory or sub-directory. The directory name in the name field
    /// should end with a slash.
    DIRTYPE = b'5',
    /// A FIFO special file. Only its existence is archived, not its contents.
    FIFOTYPE = b'6',
    /// A contiguous file, which is the same as a normal file on systems
    /// without contiguous allocation.
    CONTTYPE = b'7',
    /// Extended header referring to the next file in the archive
    XHDTYPE = b'x',
    /// Global extended header
    XGLTYPE = b'g',
    /// GNU extension: the payload is the long name of the next entry.
    GNULONGNAME = b'L',
    /// GNU extension: the payload is the long link name of the next entry.
    GNULONGLINK = b'K',
}

impl TypeFlag {
    /// Whether we have a regular file.
    pub fn is_regular_file(self) -> bool {
        self == Self::AREGTYPE || self == Self::REGTYPE
    }
}

impl TryFrom<TypeFlagRaw> for TypeFlag {
    type Error = InvalidTypeFlagError;

    fn try_from(value: TypeFlagRaw) -> Result<Self, Self::Error> {
        match value.0 {
            b'0' => Ok(Self::REGTYPE),
            b'\0' => Ok(Self::AREGTYPE),
            b'1' => Ok(Self::LINK),
            b'2' => Ok(Self::SYMTYPE),
            b'3' => Ok(Self::CHRTYPE),
            b'4' => Ok(Self::BLKTYPE),
            b'5' => Ok(Self::DIRTYPE),
            b'6' => Ok(Self::FIFOTYPE),
            b'7' => Ok(Self::CONTTYPE),
            b'x' => Ok(Self::XHDTYPE),
            b'g' => Ok(Self::XGLTYPE),
            b'L' => Ok(Self::GNULONGNAME),
            b'K' => Ok(Self::GNULONGLINK),
            e => Err(InvalidTypeFlagError(e)),
        }
    }
}

bitflags::bitflags! {
    /// UNIX file permissions in octal format.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        /// Set UID on execution.
        const SetUID = 0o4000;
        /// Set GID on execution.
        const SetGID = 0o2000;
        /// Reserved.
        const TSVTX = 0o1000;
        /// Owner read.
        const OwnerRead = 0o400;
        /// Owner write.
        const OwnerWrite = 0o200;
        /// Owner execute.
        const OwnerExec = 0o100;
        /// Group read.
        const GroupRead = 0o040;
        /// Group write.
        const GroupWrite = 0o020;
        /// Group execute.
        const GroupExec = 0o010;
        /// Others read.
        const OthersRead = 0o004;
        /// Others write.
        const OthersWrite = 0o002;
        /// Others execute.
        const OthersExec = 0o001;
    }
}
