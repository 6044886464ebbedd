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
//! Where archive bytes come from, and gzip detection.

use crate::error::Result;
#[cfg(not(feature = "gzip"))]
use crate::error::MalformedError;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Something that can be opened as byte stream, any number of times. Every
/// call to [`ByteSource::open`] has to start at the first byte again.
pub trait ByteSource {
    type Reader: Read;

    fn open(&self) -> io::Result<Self::Reader>;
}

/// A file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    type Reader = File;

    fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

/// Compression of an archive, detected from its content.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Raw,
}

impl Compression {
    /// First bytes of every gzip member.
    pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

    /// Detects the compression from the first bytes of a stream.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(&Self::GZIP_MAGIC) {
            Self::Gzip
        } else {
            Self::Raw
        }
    }
}

/// A stream with its sniffed first bytes put back in front.
pub type Sniffed<R> = io::Chain<io::Cursor<Vec<u8>>, R>;

/// The decompressed view on a stream.
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Decoder<R: Read> {
    Raw(BufReader<Sniffed<R>>),
    /// All gzip members of the stream, one after another.
    #[cfg(feature = "gzip")]
    Gzip(flate2::bufread::MultiGzDecoder<BufReader<Sniffed<R>>>),
}

impl<R: Read> Decoder<R> {
    /// Reads the first bytes of `reader` and decompresses if they are the
    /// gzip magic. The bytes are replayed, nothing is lost by the detection.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut magic = [0; Compression::GZIP_MAGIC.len()];
        let mut filled = 0;
        while filled < magic.len() {
            match reader.read(&mut magic[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let compression = Compression::sniff(&magic[..filled]);
        log::debug!("archive compression: {compression:?}");
        let reader = BufReader::new(io::Cursor::new(magic[..filled].to_vec()).chain(reader));
        match compression {
            Compression::Raw => Ok(Self::Raw(reader)),
            #[cfg(feature = "gzip")]
            Compression::Gzip => Ok(Self::Gzip(flate2::bufread::MultiGzDecoder::new(reader))),
            #[cfg(not(feature = "gzip"))]
            Compression::Gzip => Err(MalformedError::GzipDisabled.into()),
        }
    }

    pub const fn compression(&self) -> Compression {
        match self {
            Self::Raw(_) => Compression::Raw,
            #[cfg(feature = "gzip")]
            Self::Gzip(_) => Compression::Gzip,
        }
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Raw(r) => r.read(buf),
            #[cfg(feature = "gzip")]
            Self::Gzip(d) => d.read(buf),
        }
    }
}
