/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    fs::{remove_file, File},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use super::PersistentStorageModule;

/// Swap storage inside of a regular host file.
///
/// The file is created (and truncated) on construction and removed again once
/// the module is dropped.
pub struct FilePersistentStorageModule {
    /// underlying file, `None` only while dropping
    file: Option<File>,

    /// path of file, save for deleting file later
    file_path: String,

    /// cached file size, so no `metadata` call necessary
    file_size: usize,
}

impl FilePersistentStorageModule {
    pub fn new(filepath: String, size: usize) -> std::io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(true)
            .create(true)
            .open(filepath.as_str())?;

        file.set_len(size as u64)?;

        Ok(Self {
            file: Some(file),
            file_path: filepath,
            file_size: size,
        })
    }

    fn seek_to(&mut self, offset: usize, len: usize) -> Result<&mut File, ()> {
        if offset + len > self.file_size {
            return Err(());
        }

        let file = self.file.as_mut().ok_or(())?;
        file.seek(SeekFrom::Start(offset as u64)).map_err(|_| ())?;
        Ok(file)
    }
}

impl PersistentStorageModule for FilePersistentStorageModule {
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()> {
        self.seek_to(offset, dest.len())?
            .read_exact(dest)
            .map_err(|_| ())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()> {
        self.seek_to(offset, src.len())?
            .write_all(src)
            .map_err(|_| ())
    }

    fn get_max_size(&self) -> usize {
        self.file_size
    }
}

impl Drop for FilePersistentStorageModule {
    fn drop(&mut self) {
        // close file before removing it
        drop(self.file.take());

        if Path::new(self.file_path.as_str()).exists() {
            let _ = remove_file(self.file_path.as_str());
        }
    }
}
