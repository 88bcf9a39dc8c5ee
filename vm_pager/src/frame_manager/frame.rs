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

use crate::{
    address::{PhysAddr, VirtAddr},
    address_space::{AddressSpaceId, AddressSpaceInner, WeakSpaceInner},
    modules::page_table::PageTableModule,
};

/// Physical page owned by a resident page.
///
/// `slot` is the index of the frame in the frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub(crate) slot: usize,
    pub(crate) pa: PhysAddr,
}

impl Frame {
    pub fn pa(&self) -> PhysAddr {
        self.pa
    }
}

pub(crate) struct FrameOwner<T: PageTableModule> {
    pub(crate) space_id: AddressSpaceId,
    pub(crate) space: WeakSpaceInner<T>,
    pub(crate) va: VirtAddr,
}

impl<T: PageTableModule> Clone for FrameOwner<T> {
    fn clone(&self) -> Self {
        Self {
            space_id: self.space_id,
            space: self.space.clone(),
            va: self.va,
        }
    }
}

pub(crate) struct FrameEntry<T: PageTableModule> {
    pub(crate) pa: PhysAddr,
    pub(crate) owner: Option<FrameOwner<T>>,

    /// Pinned frames are never chosen for eviction
    pub(crate) pinned: bool,
}

pub(crate) enum OwnerAccess<R> {
    Done(R),

    /// The address space was dropped
    Gone,

    /// Another thread holds the address space lock
    Busy,
}

/// Runs `f` on the address space owning a frame.
///
/// Address spaces locked by the caller are passed in `held`, all others are
/// only try-locked as the frame table lock is taken after address space locks.
pub(crate) fn with_owner<T, R>(
    held: &mut [&mut AddressSpaceInner<T>],
    owner: &FrameOwner<T>,
    f: impl FnOnce(&mut AddressSpaceInner<T>) -> R,
) -> OwnerAccess<R>
where
    T: PageTableModule,
{
    if let Some(inner) = held.iter_mut().find(|inner| inner.id == owner.space_id) {
        return OwnerAccess::Done(f(&mut **inner));
    }

    let space = match owner.space.upgrade() {
        Some(space) => space,
        None => return OwnerAccess::Gone,
    };

    let result = match space.try_lock() {
        Some(mut guard) => OwnerAccess::Done(f(&mut *guard)),
        None => OwnerAccess::Busy,
    };
    result
}
