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

use super::{PageTableModule, PteFlags};
use crate::address::{PhysAddr, VirtAddr};

#[derive(Debug, Clone, Copy)]
struct PageTableEntry {
    frame: PhysAddr,
    flags: PteFlags,
}

/// Page table kept in software, the accessed and dirty bits are set by
/// whoever simulates the memory accesses.
pub struct SoftPageTableModule {
    entries: BTreeMap<usize, PageTableEntry>,
}

impl SoftPageTableModule {
    #[inline]
    fn entry(&self, va: VirtAddr) -> Option<&PageTableEntry> {
        debug_assert!(va.is_page_aligned());
        self.entries.get(&va.vpn())
    }

    #[inline]
    fn update_flag(&mut self, va: VirtAddr, flag: PteFlags, value: bool) {
        debug_assert!(va.is_page_aligned());
        if let Some(entry) = self.entries.get_mut(&va.vpn()) {
            entry.flags.set(flag, value);
        }
    }

    #[inline]
    fn has_flag(&self, va: VirtAddr, flag: PteFlags) -> bool {
        self.entry(va).is_some_and(|e| e.flags.contains(flag))
    }
}

impl PageTableModule for SoftPageTableModule {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn map(&mut self, va: VirtAddr, frame: PhysAddr, writable: bool) -> bool {
        debug_assert!(va.is_page_aligned());
        if self.entries.contains_key(&va.vpn()) {
            return false;
        }

        let mut flags = PteFlags::PRESENT | PteFlags::USER;
        flags.set(PteFlags::WRITABLE, writable);
        self.entries.insert(va.vpn(), PageTableEntry { frame, flags });
        true
    }

    fn unmap(&mut self, va: VirtAddr) {
        debug_assert!(va.is_page_aligned());
        self.entries.remove(&va.vpn());
    }

    fn translate(&self, va: VirtAddr) -> Option<PhysAddr> {
        self.entry(va).map(|e| e.frame)
    }

    fn is_writable(&self, va: VirtAddr) -> bool {
        self.has_flag(va, PteFlags::WRITABLE)
    }

    fn is_dirty(&self, va: VirtAddr) -> bool {
        self.has_flag(va, PteFlags::DIRTY)
    }

    fn set_dirty(&mut self, va: VirtAddr, dirty: bool) {
        self.update_flag(va, PteFlags::DIRTY, dirty);
    }

    fn is_accessed(&self, va: VirtAddr) -> bool {
        self.has_flag(va, PteFlags::ACCESSED)
    }

    fn set_accessed(&mut self, va: VirtAddr, accessed: bool) {
        self.update_flag(va, PteFlags::ACCESSED, accessed);
    }

    fn mapped_count(&self) -> usize {
        self.entries.len()
    }
}
