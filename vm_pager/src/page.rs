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

use core::fmt;
use std::sync::Arc;

use crate::{
    address::{VirtAddr, PAGE_SIZE},
    error::VmError,
    frame_manager::Frame,
    modules::file_system::SharedFile,
    swap::SwapSlot,
};

/// Type a page has (or will have once it is loaded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Anonymous,
    FileBacked,
    Stack,
}

/// Where the content of a page comes from: `read_bytes` bytes of `file` at
/// `offset`, followed by `zero_bytes` zeros.
#[derive(Clone)]
pub struct FileBacking {
    pub(crate) file: SharedFile,
    pub(crate) offset: usize,
    pub(crate) read_bytes: usize,
    pub(crate) zero_bytes: usize,
}

impl FileBacking {
    pub(crate) fn new(
        file: SharedFile,
        offset: usize,
        read_bytes: usize,
        zero_bytes: usize,
    ) -> Result<Self, VmError> {
        if read_bytes + zero_bytes != PAGE_SIZE {
            return Err(VmError::InvalidArgument(
                "read and zero bytes have to add up to one page",
            ));
        }

        Ok(Self {
            file,
            offset,
            read_bytes,
            zero_bytes,
        })
    }

    /// Fills `dest` with the content of this page
    pub(crate) fn load(&self, dest: &mut [u8]) -> Result<(), VmError> {
        debug_assert_eq!(dest.len(), PAGE_SIZE);

        let read = self
            .file
            .read_at(self.offset, &mut dest[..self.read_bytes])
            .map_err(|_| VmError::BackingStore("could not read from file"))?;

        if read != self.read_bytes {
            return Err(VmError::BackingStore("file is shorter than expected"));
        }

        dest[self.read_bytes..].fill(0);
        Ok(())
    }

    /// Writes the file part of `src` back.
    /// The zero filled tail is never written.
    pub(crate) fn write_back(&self, src: &[u8]) -> Result<(), VmError> {
        debug_assert_eq!(src.len(), PAGE_SIZE);

        let written = self
            .file
            .write_at(self.offset, &src[..self.read_bytes])
            .map_err(|_| VmError::BackingStore("could not write to file"))?;

        if written != self.read_bytes {
            return Err(VmError::BackingStore("short write to file"));
        }

        Ok(())
    }

    /// Does `other` continue this backing on the next page (same open file, next offset)?
    pub(crate) fn is_followed_by(&self, other: &FileBacking) -> bool {
        Arc::ptr_eq(&self.file, &other.file) && self.offset + PAGE_SIZE == other.offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn read_bytes(&self) -> usize {
        self.read_bytes
    }

    pub fn zero_bytes(&self) -> usize {
        self.zero_bytes
    }
}

impl fmt::Debug for FileBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBacking")
            .field("file", &self.file.file_id())
            .field("offset", &self.offset)
            .field("read_bytes", &self.read_bytes)
            .field("zero_bytes", &self.zero_bytes)
            .finish()
    }
}

/// What a page that was never faulted in will become
#[derive(Debug, Clone)]
pub enum UninitPage {
    /// Swap backed page, either zero filled or loaded once from a file
    /// (executable segments)
    Anonymous { source: Option<FileBacking> },

    /// Page of a memory mapped file
    FileBacked(FileBacking),
}

#[derive(Debug, Clone)]
pub enum PageKind {
    /// Not loaded yet, populated on first fault
    Uninit(UninitPage),

    /// Swap backed page. `swap_slot` is set while the content lives in swap.
    Anonymous { swap_slot: Option<SwapSlot> },

    /// Page of a memory mapped file, written back to the file when dirty
    FileBacked(FileBacking),

    /// Stack page, zero filled on first touch and swap backed afterwards
    Stack { swap_slot: Option<SwapSlot> },
}

/// Descriptor of one virtual page of an address space
#[derive(Debug)]
pub struct Page {
    pub(crate) va: VirtAddr,
    pub(crate) writable: bool,
    pub(crate) kind: PageKind,

    /// Set iff the page is resident
    pub(crate) frame: Option<Frame>,

    /// Start of the file mapping this page belongs to
    pub(crate) mapping: Option<VirtAddr>,
}

impl Page {
    pub(crate) fn new(va: VirtAddr, writable: bool, kind: PageKind) -> Self {
        debug_assert!(va.is_page_aligned());
        Self {
            va,
            writable,
            kind,
            frame: None,
            mapping: None,
        }
    }

    pub(crate) fn new_uninit(va: VirtAddr, writable: bool, init: UninitPage) -> Self {
        Self::new(va, writable, PageKind::Uninit(init))
    }

    pub(crate) fn new_stack(va: VirtAddr) -> Self {
        Self::new(va, true, PageKind::Stack { swap_slot: None })
    }

    pub fn va(&self) -> VirtAddr {
        self.va
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    pub fn is_uninit(&self) -> bool {
        matches!(self.kind, PageKind::Uninit(_))
    }

    pub fn kind(&self) -> &PageKind {
        &self.kind
    }

    /// Type of this page after it was loaded
    pub fn page_type(&self) -> PageType {
        match &self.kind {
            PageKind::Uninit(UninitPage::Anonymous { .. }) | PageKind::Anonymous { .. } => {
                PageType::Anonymous
            }
            PageKind::Uninit(UninitPage::FileBacked(_)) | PageKind::FileBacked(_) => {
                PageType::FileBacked
            }
            PageKind::Stack { .. } => PageType::Stack,
        }
    }

    /// File backing of a memory mapped page
    pub(crate) fn file_backing(&self) -> Option<&FileBacking> {
        match &self.kind {
            PageKind::Uninit(UninitPage::FileBacked(backing)) | PageKind::FileBacked(backing) => {
                Some(backing)
            }
            _ => None,
        }
    }

    /// Swap slot holding the content of this page, if it is swapped out
    pub(crate) fn swap_slot(&self) -> Option<SwapSlot> {
        match &self.kind {
            PageKind::Anonymous { swap_slot } | PageKind::Stack { swap_slot } => *swap_slot,
            _ => None,
        }
    }

    /// Kind a new page needs so that it holds the same logical content
    /// as this one, without sharing swap slots or frames.
    pub(crate) fn duplicate_kind(&self) -> PageKind {
        match &self.kind {
            PageKind::Uninit(init) => PageKind::Uninit(init.clone()),
            PageKind::Anonymous { .. } => PageKind::Anonymous { swap_slot: None },
            PageKind::FileBacked(backing) => PageKind::FileBacked(backing.clone()),
            PageKind::Stack { .. } => PageKind::Stack { swap_slot: None },
        }
    }
}

#[cfg(test)]
mod test {
    use super::{FileBacking, Page, PageKind, PageType, UninitPage};
    use crate::{
        address::{VirtAddr, PAGE_SIZE},
        error::VmError,
        modules::file_system::{FileSystemModule, MemoryFileSystemModule},
    };

    #[test]
    fn test_file_backing_load_zero_fills_tail() {
        let fs = MemoryFileSystemModule::new();
        fs.create_with("f", b"HELLO WORLD");
        let file = fs.open("f").unwrap();

        let backing = FileBacking::new(file, 6, 5, PAGE_SIZE - 5).unwrap();
        let mut page = vec![0xFFu8; PAGE_SIZE];
        backing.load(&mut page).unwrap();

        assert_eq!(&page[..5], b"WORLD");
        assert!(page[5..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_file_backing_short_file() {
        let fs = MemoryFileSystemModule::new();
        fs.create_with("f", b"HI");
        let file = fs.open("f").unwrap();

        let backing = FileBacking::new(file, 0, 10, PAGE_SIZE - 10).unwrap();
        let mut page = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            backing.load(&mut page),
            Err(VmError::BackingStore(_))
        ));
    }

    #[test]
    fn test_file_backing_rejects_bad_split() {
        let fs = MemoryFileSystemModule::new();
        fs.create_with("f", b"HI");
        let file = fs.open("f").unwrap();

        assert!(FileBacking::new(file, 0, 2, 2).is_err());
    }

    #[test]
    fn test_write_back_only_file_part() {
        let fs = MemoryFileSystemModule::new();
        fs.create_with("f", b"abcdef");
        let file = fs.open("f").unwrap();

        let backing = FileBacking::new(file, 2, 3, PAGE_SIZE - 3).unwrap();
        let page = vec![b'X'; PAGE_SIZE];
        backing.write_back(&page).unwrap();

        assert_eq!(fs.content("f").unwrap(), b"abXXXf");
    }

    #[test]
    fn test_page_type() {
        let va = VirtAddr::new(PAGE_SIZE);
        let page = Page::new_uninit(va, true, UninitPage::Anonymous { source: None });
        assert_eq!(page.page_type(), PageType::Anonymous);
        assert!(page.is_uninit());
        assert!(!page.is_resident());

        let page = Page::new_stack(va);
        assert_eq!(page.page_type(), PageType::Stack);
        assert!(matches!(page.duplicate_kind(), PageKind::Stack { swap_slot: None }));
    }
}
