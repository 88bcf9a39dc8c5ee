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

mod file_storage;
mod truncated;

pub use file_storage::FilePersistentStorageModule;
pub use truncated::TruncatedStorageModule;

/// Block storage that backs the swap area
pub trait PersistentStorageModule {
    /// Reads a region `[offset, offset + dest.len())` to a storage location `dest` that is at least `dest.len()` bytes big.
    ///
    /// If this call fails, it could be that already some data was written to `dest`.
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> Result<(), ()>;

    /// Returns the maximum size in bytes of this storage
    ///
    /// **Although `read` and `write` won't throw any error, it is illegal to read/write across this border!**
    fn get_max_size(&self) -> usize;

    /// Writes the region `src` back to the underlying storage `[offset, offset + src.len())`
    fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), ()>;
}

#[cfg(test)]
pub(crate) mod test {
    use super::{FilePersistentStorageModule, PersistentStorageModule};

    pub(crate) fn get_test_storage(test_name: &str, size: usize) -> FilePersistentStorageModule {
        FilePersistentStorageModule::new(format!("/tmp/{}.tmp", test_name), size).unwrap()
    }

    fn gen_number(i: usize) -> u8 {
        (i * 3 + (i % 3) * 7 + (i % 11) * 51) as u8
    }

    pub(super) const PERSISTENT_STORAGE_NORMAL_TEST_SIZE: usize = 4 * 4096;

    /// test if write saves all data and read restores all of it
    pub(super) fn test_persistent_storage_normal<T: PersistentStorageModule>(mut module: T) {
        const SUB_TEST_SIZE: usize = PERSISTENT_STORAGE_NORMAL_TEST_SIZE / 32;

        // generate some data
        let mut source_slice = [0u8; PERSISTENT_STORAGE_NORMAL_TEST_SIZE];
        for i in 0..PERSISTENT_STORAGE_NORMAL_TEST_SIZE {
            source_slice[i] = gen_number(i);
        }

        for i in 0..PERSISTENT_STORAGE_NORMAL_TEST_SIZE / SUB_TEST_SIZE {
            let offset = i * SUB_TEST_SIZE;
            module
                .write(offset, &source_slice[offset..offset + SUB_TEST_SIZE])
                .unwrap();
        }

        let mut test_slice = [0u8; SUB_TEST_SIZE];
        for i in 0..PERSISTENT_STORAGE_NORMAL_TEST_SIZE / SUB_TEST_SIZE {
            let offset = i * SUB_TEST_SIZE;
            module.read(offset, &mut test_slice).unwrap();

            assert_eq!(&test_slice[..], &source_slice[offset..offset + SUB_TEST_SIZE]);
        }
    }
}
