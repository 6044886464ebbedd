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
//! Library to read Tar archives (by GNU Tar) from byte streams that can only
//! be read forward, such as the output of a gzip decoder.
//!
//! Every header is checksum-verified before it is trusted. Names longer than
//! 100 bytes are supported both as ustar name prefix and as GNU long name
//! (`././@LongLink` pseudo entry). Gzip-compressed archives are detected by
//! their content.
//!
//! [`Archive`] is the entry point. It catalogs the entries with one stream and
//! serves payloads with a second one, which is reopened from the start when an
//! entry before its current position is requested:
//!
//! ```no_run
//! use std::io::Read;
//! use tar_stream_reader::Archive;
//!
//! # fn main() -> Result<(), tar_stream_reader::TarError> {
//! let mut archive = Archive::open("plugin.tar.gz")?;
//! for entry in archive.catalog()?.to_vec() {
//!     let mut content = Vec::new();
//!     archive.get_input_stream(&entry)?.read_to_end(&mut content)?;
//!     println!("{entry}: {} bytes read", content.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The lower layers are public as well: [`parse_header`] decodes a single
//! header block and [`EntryCursor`] walks an uncompressed stream.
//!
//! Not supported are writing archives, POSIX extended (pax) headers, sparse
//! files and GNU base-256 encoded numbers.

#![deny(rustdoc::all)]
#![allow(rustdoc::missing_doc_code_examples)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations)]

/// Each Archive Entry (either Header or Data Block) is a block of 512 bytes.
pub const BLOCKSIZE: usize = 512;
/// Maximum length of the name field of a header, including the NULL byte.
pub const NAME_LEN: usize = 100;
/// Length of the ustar name prefix field.
pub const PREFIX_LEN: usize = 155;

mod archive;
mod cursor;
mod entry;
mod error;
mod extract;
mod header;
mod source;
mod tar_format_types;

pub use archive::*;
pub use cursor::*;
pub use entry::*;
pub use error::*;
pub use header::*;
pub use source::*;
pub use tar_format_types::*;
