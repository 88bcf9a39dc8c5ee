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

use std::collections::BTreeMap;

use log::{trace, warn};

use crate::{
    address::VirtAddr,
    error::WritebackReport,
    frame_manager::FrameManager,
    mmap::writeback_page,
    modules::{
        eviction::EvictionPolicyModule, page_table::PageTableModule,
        persistent_storage::PersistentStorageModule, physical_memory::PhysicalMemoryModule,
    },
    page::Page,
};

/// Per address space record of all known virtual pages, keyed by virtual page number
pub struct SupplementalPageTable {
    pages: BTreeMap<usize, Page>,
}

impl SupplementalPageTable {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Inserts `page`, fails if there already is a page at the same address
    pub fn insert(&mut self, page: Page) -> bool {
        let vpn = page.va.vpn();
        if self.pages.contains_key(&vpn) {
            return false;
        }

        self.pages.insert(vpn, page);
        true
    }

    /// Page containing `addr`
    pub fn find(&self, addr: VirtAddr) -> Option<&Page> {
        self.pages.get(&addr.vpn())
    }

    pub(crate) fn find_mut(&mut self, addr: VirtAddr) -> Option<&mut Page> {
        self.pages.get_mut(&addr.vpn())
    }

    pub fn contains(&self, addr: VirtAddr) -> bool {
        self.pages.contains_key(&addr.vpn())
    }

    /// Is any page in `[start, start + len)` known?
    pub fn overlaps(&self, start: VirtAddr, len: usize) -> bool {
        self.first_in(start, len).is_some()
    }

    /// Lowest known page in `[start, start + len)`
    pub fn first_in(&self, start: VirtAddr, len: usize) -> Option<VirtAddr> {
        let first = start.vpn();
        let last = (start.as_usize() + len - 1) / crate::address::PAGE_SIZE;
        self.pages.range(first..=last).next().map(|(_, page)| page.va)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages in ascending address order
    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// Removes the page without releasing anything it holds
    pub(crate) fn remove(&mut self, addr: VirtAddr) -> Option<Page> {
        self.pages.remove(&addr.vpn())
    }

    /// Removes the page containing `addr` and releases its frame and swap slot.
    ///
    /// Content is discarded, callers that need writeback have to do it first.
    pub(crate) fn remove_and_destroy<P, E, S, T>(
        &mut self,
        addr: VirtAddr,
        frames: &FrameManager<P, E, S, T>,
        page_table: &mut T,
    ) -> bool
    where
        P: PhysicalMemoryModule,
        E: EvictionPolicyModule,
        S: PersistentStorageModule,
        T: PageTableModule,
    {
        match self.remove(addr) {
            Some(page) => {
                destroy_page(page, frames, page_table);
                true
            }
            None => false,
        }
    }

    /// Destroys every page without writing anything back
    pub(crate) fn discard_all<P, E, S, T>(
        &mut self,
        frames: &FrameManager<P, E, S, T>,
        page_table: &mut T,
    ) where
        P: PhysicalMemoryModule,
        E: EvictionPolicyModule,
        S: PersistentStorageModule,
        T: PageTableModule,
    {
        for (_, page) in core::mem::take(&mut self.pages) {
            destroy_page(page, frames, page_table);
        }
    }

    /// Destroys every page, dirty file backed pages are written back first.
    pub(crate) fn destroy_all<P, E, S, T>(
        &mut self,
        frames: &FrameManager<P, E, S, T>,
        page_table: &mut T,
    ) -> WritebackReport
    where
        P: PhysicalMemoryModule,
        E: EvictionPolicyModule,
        S: PersistentStorageModule,
        T: PageTableModule,
    {
        let mut report = WritebackReport::default();

        for (_, page) in core::mem::take(&mut self.pages) {
            match writeback_page(frames, page_table, &page) {
                Ok(true) => report.pages_written += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!("lost modified content of page {}: {}", page.va, err);
                    report.failed.push(page.va);
                }
            }

            destroy_page(page, frames, page_table);
            report.pages_removed += 1;
        }

        report
    }
}

impl Default for SupplementalPageTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases everything `page` holds: its mapping, its frame and its swap slot
pub(crate) fn destroy_page<P, E, S, T>(
    page: Page,
    frames: &FrameManager<P, E, S, T>,
    page_table: &mut T,
) where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    trace!("Destroy page {}", page.va);

    if let Some(frame) = page.frame {
        page_table.unmap(page.va);
        frames.release_frame(frame);
    }

    if let Some(slot) = page.swap_slot() {
        frames.free_swap_slot(slot);
    }

    // open file handles are closed when `page` is dropped
}
