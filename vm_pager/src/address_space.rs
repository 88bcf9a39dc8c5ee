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
    sync::{Arc, Weak},
};

use log::warn;
use spin::{Mutex, MutexGuard};

use crate::{
    address::VirtAddr,
    modules::page_table::PageTableModule,
    page::PageType,
    spt::SupplementalPageTable,
};

pub(crate) type SharedSpaceInner<T> = Arc<Mutex<AddressSpaceInner<T>>>;
pub(crate) type WeakSpaceInner<T> = Weak<Mutex<AddressSpaceInner<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressSpaceId(pub(crate) usize);

/// Pages created by one `map_file` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MappingRegion {
    pub(crate) page_count: usize,
}

pub(crate) struct AddressSpaceInner<T: PageTableModule> {
    pub(crate) id: AddressSpaceId,

    /// Back reference handed to the frame manager as owner of frames
    pub(crate) this: WeakSpaceInner<T>,

    pub(crate) spt: SupplementalPageTable,

    pub(crate) page_table: T,

    /// User stack pointer saved on the last switch into the kernel.
    /// Used for faults raised while running kernel code.
    pub(crate) stack_pointer: usize,

    /// File mappings by start address
    pub(crate) mappings: BTreeMap<VirtAddr, MappingRegion>,

    /// Set once the address space was torn down
    pub(crate) destroyed: bool,
}

/// Handle to the address space of one process.
///
/// Dropping the handle without passing it to `Vm::destroy_address_space`
/// leaks its swap slots and leaves its dirty file pages unwritten.
pub struct AddressSpace<T: PageTableModule> {
    inner: SharedSpaceInner<T>,
    id: AddressSpaceId,
}

impl<T: PageTableModule> AddressSpace<T> {
    pub(crate) fn new(id: AddressSpaceId) -> Self {
        let inner = Arc::new_cyclic(|this| {
            Mutex::new(AddressSpaceInner {
                id,
                this: this.clone(),
                spt: SupplementalPageTable::new(),
                page_table: T::new(),
                stack_pointer: 0,
                mappings: BTreeMap::new(),
                destroyed: false,
            })
        });

        Self { inner, id }
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, AddressSpaceInner<T>> {
        self.inner.lock()
    }

    pub fn id(&self) -> AddressSpaceId {
        self.id
    }

    /// Saves the user stack pointer, called on every switch from user to kernel mode
    pub fn set_stack_pointer(&self, rsp: usize) {
        self.lock().stack_pointer = rsp;
    }

    pub fn stack_pointer(&self) -> usize {
        self.lock().stack_pointer
    }

    /// Number of page descriptors
    pub fn page_count(&self) -> usize {
        self.lock().spt.len()
    }

    /// Number of pages that currently occupy a frame
    pub fn resident_count(&self) -> usize {
        self.lock().spt.iter().filter(|p| p.is_resident()).count()
    }

    pub fn contains(&self, addr: VirtAddr) -> bool {
        self.lock().spt.contains(addr)
    }

    pub fn is_resident(&self, addr: VirtAddr) -> bool {
        self.lock().spt.find(addr).is_some_and(|p| p.is_resident())
    }

    pub fn is_writable(&self, addr: VirtAddr) -> bool {
        self.lock().spt.find(addr).is_some_and(|p| p.is_writable())
    }

    pub fn page_type(&self, addr: VirtAddr) -> Option<PageType> {
        self.lock().spt.find(addr).map(|p| p.page_type())
    }

    /// Number of active file mappings
    pub fn mapping_count(&self) -> usize {
        self.lock().mappings.len()
    }
}

impl<T: PageTableModule> Drop for AddressSpace<T> {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        if !inner.destroyed && !inner.spt.is_empty() {
            warn!(
                "address space {:?} dropped with {} pages without being destroyed",
                inner.id,
                inner.spt.len()
            );
        }
    }
}
