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
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use log::trace;
use spin::Mutex;

use super::{FileModule, FileSystemModule, SharedFile};

struct Inode {
    id: usize,

    /// Content of the file. The lock serializes all I/O on this file.
    data: Mutex<Vec<u8>>,

    /// If set, every write fails
    read_only: AtomicBool,
}

/// File system that keeps all files in host memory
pub struct MemoryFileSystemModule {
    files: Mutex<BTreeMap<String, Arc<Inode>>>,
    next_id: AtomicUsize,
}

impl MemoryFileSystemModule {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Creates a file with the given content, replacing a previous file at `path`
    pub fn create_with(&self, path: &str, content: &[u8]) {
        let inode = Arc::new(Inode {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            data: Mutex::new(content.to_vec()),
            read_only: AtomicBool::new(false),
        });
        self.files.lock().insert(path.to_string(), inode);
    }

    /// Makes every write to the file at `path` fail (or succeed again)
    pub fn set_read_only(&self, path: &str, read_only: bool) -> Result<(), ()> {
        let files = self.files.lock();
        let inode = files.get(path).ok_or(())?;
        inode.read_only.store(read_only, Ordering::SeqCst);
        Ok(())
    }

    /// Copy of the current content of the file at `path`
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.lock();
        files.get(path).map(|inode| inode.data.lock().clone())
    }
}

impl Default for MemoryFileSystemModule {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemModule for MemoryFileSystemModule {
    fn create(&self, path: &str, initial_size: usize) -> Result<(), ()> {
        if self.files.lock().contains_key(path) {
            return Err(());
        }
        self.create_with(path, &vec![0u8; initial_size]);
        Ok(())
    }

    fn open(&self, path: &str) -> Result<SharedFile, ()> {
        let files = self.files.lock();
        let inode = files.get(path).ok_or(())?;
        trace!("Open file {} (inode {})", path, inode.id);

        Ok(Arc::new(MemoryFile {
            inode: inode.clone(),
        }))
    }

    fn remove(&self, path: &str) -> Result<(), ()> {
        self.files.lock().remove(path).map(|_| ()).ok_or(())
    }
}

/// Open handle of a file of a [`MemoryFileSystemModule`]
pub struct MemoryFile {
    inode: Arc<Inode>,
}

impl FileModule for MemoryFile {
    fn read_at(&self, offset: usize, dest: &mut [u8]) -> Result<usize, ()> {
        let data = self.inode.data.lock();
        if offset >= data.len() {
            return Ok(0);
        }

        let len = dest.len().min(data.len() - offset);
        dest[..len].copy_from_slice(&data[offset..offset + len]);
        Ok(len)
    }

    fn write_at(&self, offset: usize, src: &[u8]) -> Result<usize, ()> {
        if self.inode.read_only.load(Ordering::SeqCst) {
            return Err(());
        }

        let mut data = self.inode.data.lock();
        if offset >= data.len() {
            return Ok(0);
        }

        let len = src.len().min(data.len() - offset);
        data[offset..offset + len].copy_from_slice(&src[..len]);
        Ok(len)
    }

    fn len(&self) -> usize {
        self.inode.data.lock().len()
    }

    fn reopen(&self) -> Result<SharedFile, ()> {
        Ok(Arc::new(MemoryFile {
            inode: self.inode.clone(),
        }))
    }

    fn file_id(&self) -> usize {
        self.inode.id
    }
}
