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
//! Unpacking an [`Archive`] into a directory.

use crate::archive::Archive;
use crate::entry::{ArchiveEntry, EntryType};
use crate::error::{Result, TarError};
use crate::source::ByteSource;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

impl<S: ByteSource> Archive<S> {
    /// Writes all directories and regular files of the archive below `dest`
    /// and returns the created paths. Other entry types are skipped.
    /// Permissions and ownership from the archive are not applied.
    ///
    /// # Errors
    /// [`TarError::PathTraversal`] if an entry would end up outside of
    /// `dest`. Nothing is written for that entry.
    pub fn unpack(&mut self, dest: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dest = dest.as_ref();
        let entries = self.catalog()?.to_vec();
        let mut written = Vec::with_capacity(entries.len());

        for entry in &entries {
            let target = dest.join(relative_path(entry)?);
            match entry.entry_type() {
                EntryType::Directory => fs::create_dir_all(&target)?,
                EntryType::File => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let mut file = File::create(&target)?;
                    io::copy(&mut self.get_input_stream(entry)?, &mut file)?;
                }
                other => {
                    log::warn!("not extracting `{}`: unsupported entry type {other}", entry.name());
                    continue;
                }
            }
            log::trace!("extracted {}", target.display());
            written.push(target);
        }
        Ok(written)
    }
}

/// The name of `entry` as relative path without `.` components.
fn relative_path(entry: &ArchiveEntry) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for component in entry.path().components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TarError::PathTraversal {
                    name: entry.name().to_string(),
                });
            }
        }
    }
    Ok(path)
}
