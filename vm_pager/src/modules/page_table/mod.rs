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

mod soft;

pub use soft::SoftPageTableModule;

use bitflags::bitflags;

use crate::address::{PhysAddr, VirtAddr};

bitflags! {
    /// Flags of one page table entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u8 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
    }
}

/// The hardware page table of one address space.
///
/// All addresses passed in are page aligned.
pub trait PageTableModule {
    fn new() -> Self;

    /// Maps `va` to `frame`. Returns `false` if `va` is already mapped.
    fn map(&mut self, va: VirtAddr, frame: PhysAddr, writable: bool) -> bool;

    /// Removes the mapping of `va`, if there is one
    fn unmap(&mut self, va: VirtAddr);

    /// Physical frame `va` is mapped to
    fn translate(&self, va: VirtAddr) -> Option<PhysAddr>;

    fn is_writable(&self, va: VirtAddr) -> bool;

    /// Was the page written since it was mapped or since the bit was last cleared?
    fn is_dirty(&self, va: VirtAddr) -> bool;

    fn set_dirty(&mut self, va: VirtAddr, dirty: bool);

    /// Was the page accessed since it was mapped or since the bit was last cleared?
    fn is_accessed(&self, va: VirtAddr) -> bool;

    fn set_accessed(&mut self, va: VirtAddr, accessed: bool);

    /// Number of present mappings
    fn mapped_count(&self) -> usize;
}
