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

mod memory;

pub use memory::{MemoryFile, MemoryFileSystemModule};

use std::sync::Arc;

/// An open file. Dropping the last reference closes it.
pub type SharedFile = Arc<dyn FileModule>;

/// Handle to an open file of the file system collaborator.
///
/// Implementations do their own locking, every call may be made from any thread.
pub trait FileModule: Send + Sync {
    /// Reads up to `dest.len()` bytes starting at `offset`, returns how many bytes were read
    fn read_at(&self, offset: usize, dest: &mut [u8]) -> Result<usize, ()>;

    /// Writes up to `src.len()` bytes starting at `offset`, returns how many bytes were written.
    ///
    /// Writing never grows the file.
    fn write_at(&self, offset: usize, src: &[u8]) -> Result<usize, ()>;

    /// Current length of the file in bytes
    fn len(&self) -> usize;

    /// Opens the same underlying file again, the new handle is independent of this one
    fn reopen(&self) -> Result<SharedFile, ()>;

    /// Identifies the underlying file, equal for all handles of the same file
    fn file_id(&self) -> usize;
}

/// The file system collaborator
pub trait FileSystemModule {
    /// Creates a file of `initial_size` zero bytes
    fn create(&self, path: &str, initial_size: usize) -> Result<(), ()>;

    fn open(&self, path: &str) -> Result<SharedFile, ()>;

    /// Removes `path` from the file system, open handles stay usable
    fn remove(&self, path: &str) -> Result<(), ()>;
}
