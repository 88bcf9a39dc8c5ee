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

mod frame;


pub use frame::Frame;
pub(crate) use frame::{with_owner, FrameEntry, FrameOwner, OwnerAccess};

use log::{debug, error, trace, warn};
use spin::Mutex;

use crate::{
    address::{PhysAddr, VirtAddr, PAGE_SIZE},
    address_space::AddressSpaceInner,
    error::VmError,
    modules::{
        eviction::{EvictionPolicyModule, FrameInspector},
        page_table::PageTableModule,
        persistent_storage::PersistentStorageModule,
        physical_memory::PhysicalMemoryModule,
    },
    page::PageKind,
    swap::{SwapSlot, SwapTable},
};

/// Snapshot of the frame and swap usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Frames currently owned by a page
    pub frames_used: usize,
    pub frames_total: usize,
    pub swap_slots_used: usize,
    pub swap_slots_total: usize,
    /// Pages evicted since startup
    pub evictions: usize,
}

struct FrameTable<P, E, S, T>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    physical: P,
    frames: Vec<Option<FrameEntry<T>>>,
    policy: E,
    swap: SwapTable<S>,
    evictions: usize,
}

enum EvictError {
    /// Some candidates were locked by other threads, worth another try
    Busy,
    NoVictim,
}

enum DetachError {
    Busy,
    Persist(VmError),
}

/// Global table of all frames handed out to user pages.
///
/// Lock order: address space lock, then the frame table lock, then file locks.
pub struct FrameManager<P, E, S, T>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    table: Mutex<FrameTable<P, E, S, T>>,
    eviction_retries: usize,
}

impl<P, E, S, T> FrameManager<P, E, S, T>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    pub(crate) fn new(physical: P, swap_storage: S, eviction_retries: usize) -> Self {
        let frames = Vec::with_capacity(physical.capacity());
        Self {
            table: Mutex::new(FrameTable {
                physical,
                frames,
                policy: E::new(),
                swap: SwapTable::new(swap_storage),
                evictions: 0,
            }),
            eviction_retries,
        }
    }

    /// Returns a zeroed and pinned frame for page `va` of `held[owner]`.
    ///
    /// Evicts another page if physical memory is exhausted.
    /// Pages of address spaces in `held` may be evicted, their locks are already
    /// held by the caller. Fails with `OutOfMemory` if no page can be evicted.
    pub(crate) fn acquire_frame(
        &self,
        held: &mut [&mut AddressSpaceInner<T>],
        owner: usize,
        va: VirtAddr,
    ) -> Result<Frame, VmError> {
        for _ in 0..=self.eviction_retries {
            let mut table = self.table.lock();

            if let Some(pa) = table.physical.alloc_page(true) {
                let new_owner = owner_of(held, owner, va);
                let slot = table.insert(FrameEntry {
                    pa,
                    owner: Some(new_owner),
                    pinned: true,
                });

                trace!("Allocated frame {} ({:?}) for {}", slot, pa, va);
                return Ok(Frame { slot, pa });
            }

            match table.evict_one(held) {
                Ok(frame) => {
                    table.physical.page_mut(frame.pa).fill(0);

                    let new_owner = owner_of(held, owner, va);
                    if let Some(entry) = table.frames[frame.slot].as_mut() {
                        entry.owner = Some(new_owner);
                        entry.pinned = true;
                    }

                    trace!("Reused frame {} ({:?}) for {}", frame.slot, frame.pa, va);
                    return Ok(frame);
                }
                Err(EvictError::Busy) => {
                    drop(table);
                    std::thread::yield_now();
                }
                Err(EvictError::NoVictim) => {
                    warn!("out of memory: no frame can be evicted for {}", va);
                    return Err(VmError::OutOfMemory);
                }
            }
        }

        warn!("out of memory: eviction candidates stayed locked for {}", va);
        Err(VmError::OutOfMemory)
    }

    /// Returns `frame` to physical memory, the owning page has to be detached already
    pub(crate) fn release_frame(&self, frame: Frame) {
        let mut table = self.table.lock();
        match table.frames.get_mut(frame.slot).and_then(|entry| entry.take()) {
            Some(entry) => {
                debug_assert_eq!(entry.pa, frame.pa);
                table.physical.free_page(entry.pa);
                trace!("Released frame {}", frame.slot);
            }
            None => error!("released frame {} that is not in use", frame.slot),
        }
    }

    pub(crate) fn pin(&self, frame: Frame) {
        self.set_pinned(frame, true);
    }

    pub(crate) fn unpin(&self, frame: Frame) {
        self.set_pinned(frame, false);
    }

    fn set_pinned(&self, frame: Frame, pinned: bool) {
        let mut table = self.table.lock();
        if let Some(Some(entry)) = table.frames.get_mut(frame.slot) {
            entry.pinned = pinned;
        }
    }

    /// Copies frame content starting at `offset` into `dest`
    pub(crate) fn read_page(&self, pa: PhysAddr, offset: usize, dest: &mut [u8]) {
        let table = self.table.lock();
        dest.copy_from_slice(&table.physical.page(pa)[offset..offset + dest.len()]);
    }

    pub(crate) fn write_page(&self, pa: PhysAddr, offset: usize, src: &[u8]) {
        let mut table = self.table.lock();
        table.physical.page_mut(pa)[offset..offset + src.len()].copy_from_slice(src);
    }

    pub(crate) fn copy_page(&self, from: PhysAddr, to: PhysAddr) {
        let mut table = self.table.lock();
        let mut buffer = [0u8; PAGE_SIZE];
        buffer.copy_from_slice(table.physical.page(from));
        table.physical.page_mut(to).copy_from_slice(&buffer);
    }

    /// Loads the page stored in `slot` into `frame` and frees the slot.
    /// On failure the slot keeps its content.
    pub(crate) fn swap_in(&self, slot: SwapSlot, frame: Frame) -> Result<(), VmError> {
        let mut table = self.table.lock();
        let FrameTable { physical, swap, .. } = &mut *table;
        swap.swap_in(slot, physical.page_mut(frame.pa))
    }

    pub(crate) fn free_swap_slot(&self, slot: SwapSlot) {
        self.table.lock().swap.free(slot);
    }

    pub fn stats(&self) -> FrameStats {
        let table = self.table.lock();
        FrameStats {
            frames_used: table.frames.iter().filter(|entry| entry.is_some()).count(),
            frames_total: table.physical.capacity(),
            swap_slots_used: table.swap.used_slots(),
            swap_slots_total: table.swap.slot_count(),
            evictions: table.evictions,
        }
    }
}

fn owner_of<T: PageTableModule>(
    held: &[&mut AddressSpaceInner<T>],
    owner: usize,
    va: VirtAddr,
) -> FrameOwner<T> {
    FrameOwner {
        space_id: held[owner].id,
        space: held[owner].this.clone(),
        va,
    }
}

impl<P, E, S, T> FrameTable<P, E, S, T>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    fn insert(&mut self, entry: FrameEntry<T>) -> usize {
        match self.frames.iter().position(|entry| entry.is_none()) {
            Some(slot) => {
                self.frames[slot] = Some(entry);
                slot
            }
            None => {
                self.frames.push(Some(entry));
                self.frames.len() - 1
            }
        }
    }

    /// Frees one frame by evicting the page that owns it.
    /// The frame stays in the table with no owner.
    fn evict_one(&mut self, held: &mut [&mut AddressSpaceInner<T>]) -> Result<Frame, EvictError> {
        let mut busy = false;

        for _ in 0..self.frames.len() {
            let victim = {
                let FrameTable { frames, policy, .. } = self;
                let mut inspector = TableInspector {
                    frames,
                    held: &mut *held,
                    busy: &mut busy,
                };
                policy.select_victim(&mut inspector)
            };

            let slot = match victim {
                Some(slot) => slot,
                None => break,
            };

            match self.detach(slot, held) {
                Ok(frame) => {
                    self.evictions += 1;
                    return Ok(frame);
                }
                Err(DetachError::Busy) => busy = true,
                Err(DetachError::Persist(err)) => {
                    // the page stays resident, try the next victim
                    warn!("could not evict frame {}: {}", slot, err);
                }
            }
        }

        if busy {
            Err(EvictError::Busy)
        } else {
            Err(EvictError::NoVictim)
        }
    }

    fn detach(
        &mut self,
        slot: usize,
        held: &mut [&mut AddressSpaceInner<T>],
    ) -> Result<Frame, DetachError> {
        let FrameTable {
            physical,
            frames,
            swap,
            ..
        } = self;

        let entry = match frames.get_mut(slot) {
            Some(Some(entry)) => entry,
            _ => {
                error!("eviction policy selected unused frame {}", slot);
                return Err(DetachError::Persist(VmError::OutOfMemory));
            }
        };
        let frame = Frame { slot, pa: entry.pa };

        if let Some(owner) = entry.owner.clone() {
            let result = with_owner(held, &owner, |inner| {
                evict_page(inner, owner.va, frame.pa, physical, swap)
            });

            match result {
                OwnerAccess::Done(Ok(())) => {
                    debug!("Evicted page {} of {:?}", owner.va, owner.space_id)
                }
                OwnerAccess::Done(Err(err)) => return Err(DetachError::Persist(err)),
                OwnerAccess::Gone => {
                    warn!(
                        "reclaimed frame {} of dropped address space {:?}",
                        slot, owner.space_id
                    )
                }
                OwnerAccess::Busy => return Err(DetachError::Busy),
            }
        }

        entry.owner = None;
        Ok(frame)
    }
}

/// Moves the content of resident page `va` to its backing store and unmaps it.
/// Nothing changes if persisting fails.
fn evict_page<P, S, T>(
    inner: &mut AddressSpaceInner<T>,
    va: VirtAddr,
    pa: PhysAddr,
    physical: &mut P,
    swap: &mut SwapTable<S>,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    let dirty = inner.page_table.is_dirty(va);

    let page = match inner.spt.find_mut(va) {
        Some(page) => page,
        None => {
            error!("frame owner {} has no page descriptor", va);
            inner.page_table.unmap(va);
            return Ok(());
        }
    };

    match &mut page.kind {
        PageKind::Anonymous { swap_slot } | PageKind::Stack { swap_slot } => {
            *swap_slot = Some(swap.swap_out(physical.page(pa))?);
        }
        PageKind::FileBacked(backing) => {
            if dirty {
                backing.write_back(physical.page(pa))?;
            }
        }
        PageKind::Uninit(_) => error!("uninitialized page {} owns a frame", va),
    }

    page.frame = None;
    inner.page_table.unmap(va);
    Ok(())
}

struct TableInspector<'a, 'b, T: PageTableModule> {
    frames: &'a mut Vec<Option<FrameEntry<T>>>,
    held: &'a mut [&'b mut AddressSpaceInner<T>],
    busy: &'a mut bool,
}

impl<T: PageTableModule> FrameInspector for TableInspector<'_, '_, T> {
    fn slot_count(&self) -> usize {
        self.frames.len()
    }

    fn is_evictable(&mut self, slot: usize) -> bool {
        let entry = match &self.frames[slot] {
            Some(entry) if !entry.pinned => entry,
            _ => return false,
        };

        let owner = match &entry.owner {
            Some(owner) => owner,
            None => return true,
        };

        match with_owner(self.held, owner, |_| ()) {
            OwnerAccess::Done(()) | OwnerAccess::Gone => true,
            OwnerAccess::Busy => {
                *self.busy = true;
                false
            }
        }
    }

    fn test_and_clear_accessed(&mut self, slot: usize) -> bool {
        let owner = match &self.frames[slot] {
            Some(FrameEntry {
                owner: Some(owner), ..
            }) => owner,
            _ => return false,
        };

        let va = owner.va;
        match with_owner(self.held, owner, |inner| {
            let accessed = inner.page_table.is_accessed(va);
            inner.page_table.set_accessed(va, false);
            accessed
        }) {
            OwnerAccess::Done(accessed) => accessed,
            _ => false,
        }
    }
}
