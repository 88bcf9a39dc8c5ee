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

use log::{debug, trace};

use crate::{
    address::VirtAddr,
    address_space::AddressSpaceInner,
    error::VmError,
    fault::claim_page,
    frame_manager::FrameManager,
    modules::{
        eviction::EvictionPolicyModule, page_table::PageTableModule,
        persistent_storage::PersistentStorageModule, physical_memory::PhysicalMemoryModule,
    },
    page::Page,
};

/// Copies every page of `parent` into the empty address space `child`.
///
/// Pages that were never loaded stay unloaded in the child. All other pages
/// get a private frame holding a copy of the parent content.
/// On failure `child` may hold some of the pages, the caller discards it.
pub(crate) fn duplicate<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    parent: &mut AddressSpaceInner<T>,
    child: &mut AddressSpaceInner<T>,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    debug_assert!(child.spt.is_empty());

    let pages: Vec<VirtAddr> = parent.spt.iter().map(|page| page.va).collect();
    for va in pages {
        duplicate_page(frames, parent, child, va)?;
    }

    child.mappings = parent.mappings.clone();
    child.stack_pointer = parent.stack_pointer;

    debug!(
        "Duplicated {:?} into {:?} ({} pages)",
        parent.id,
        child.id,
        child.spt.len()
    );
    Ok(())
}

fn duplicate_page<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    parent: &mut AddressSpaceInner<T>,
    child: &mut AddressSpaceInner<T>,
    va: VirtAddr,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    let source = parent.spt.find(va).ok_or(VmError::InvalidAddress(va))?;
    let writable = source.writable;
    let is_uninit = source.is_uninit();

    let mut page = Page::new(va, writable, source.duplicate_kind());
    page.mapping = source.mapping;
    if !child.spt.insert(page) {
        return Err(VmError::DuplicateMapping(va));
    }

    if is_uninit {
        return Ok(());
    }

    let mut held = [&mut *parent, &mut *child];

    // swapped out parent pages are loaded first, the copy is taken from memory
    claim_page(frames, &mut held, 0, va)?;
    let parent_frame = held[0]
        .spt
        .find(va)
        .and_then(|page| page.frame)
        .ok_or(VmError::InvalidAddress(va))?;
    let dirty = held[0].page_table.is_dirty(va);

    frames.pin(parent_frame);
    let child_frame = match frames.acquire_frame(&mut held, 1, va) {
        Ok(frame) => frame,
        Err(err) => {
            frames.unpin(parent_frame);
            return Err(err);
        }
    };

    frames.copy_page(parent_frame.pa, child_frame.pa);
    frames.unpin(parent_frame);

    let child = &mut *held[1];
    if let Some(page) = child.spt.find_mut(va) {
        page.frame = Some(child_frame);
    }
    let mapped = child.page_table.map(va, child_frame.pa, writable);
    debug_assert!(mapped);
    child.page_table.set_dirty(va, dirty);

    frames.unpin(child_frame);
    trace!("Copied page {} into frame {}", va, child_frame.slot);
    Ok(())
}
