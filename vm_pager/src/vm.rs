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

use core::{
    ops::Range,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::{debug, info, warn};

use crate::{
    address::{PhysAddr, VirtAddr, PAGE_SIZE},
    address_space::{AddressSpace, AddressSpaceId},
    error::{VmError, WritebackReport},
    fault::{self, PageFault},
    fork,
    frame_manager::{FrameManager, FrameStats},
    mmap,
    modules::{
        eviction::{ClockEvictionModule, EvictionPolicyModule},
        file_system::SharedFile,
        page_table::{PageTableModule, SoftPageTableModule},
        persistent_storage::PersistentStorageModule,
        physical_memory::{BoundedPhysicalMemoryModule, PhysicalMemoryModule},
    },
    page::{FileBacking, Page, UninitPage},
    vm_config::VmConfig,
};

/// Virtual memory with bounded physical memory, clock eviction and the software page table
pub type DefaultVm<S> =
    Vm<BoundedPhysicalMemoryModule, ClockEvictionModule, S, SoftPageTableModule>;

/// Demand paged virtual memory shared by all address spaces.
///
/// Physical frames are taken from `P`, evicted anonymous and stack pages are
/// swapped out to `S`, victims are chosen by `E` and every address space uses
/// a page table of type `T`.
pub struct Vm<P, E, S, T>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    frames: FrameManager<P, E, S, T>,
    config: VmConfig,
    next_space_id: AtomicUsize,
}

impl<P, E, S, T> Vm<P, E, S, T>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    pub fn new(physical: P, swap_storage: S, config: VmConfig) -> Self {
        info!(
            "Initializing virtual memory: {} frames, {} bytes of swap",
            physical.capacity(),
            swap_storage.get_max_size()
        );

        Self {
            frames: FrameManager::new(physical, swap_storage, config.eviction_retries),
            config,
            next_space_id: AtomicUsize::new(1),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn create_address_space(&self) -> AddressSpace<T> {
        let id = AddressSpaceId(self.next_space_id.fetch_add(1, Ordering::Relaxed));
        debug!("Created address space {:?}", id);
        AddressSpace::new(id)
    }

    /// Resolves a page fault of `space`.
    ///
    /// An error means the access was illegal or could not be served,
    /// the faulting process has to be terminated.
    pub fn handle_page_fault(
        &self,
        space: &AddressSpace<T>,
        fault: PageFault,
    ) -> Result<(), VmError> {
        let mut inner = space.lock();
        fault::handle_fault(&self.frames, &self.config, &mut inner, &fault)
    }

    /// Registers a page of an executable segment.
    ///
    /// On first access `read_bytes` bytes are loaded from `file` at `offset`
    /// and the rest of the page is zeroed. Afterwards the page is swap backed.
    pub fn create_lazy_segment_page(
        &self,
        space: &AddressSpace<T>,
        va: VirtAddr,
        file: &SharedFile,
        offset: usize,
        read_bytes: usize,
        zero_bytes: usize,
        writable: bool,
    ) -> Result<(), VmError> {
        self.check_user_page(va)?;
        let backing = FileBacking::new(file.clone(), offset, read_bytes, zero_bytes)?;

        let page = Page::new_uninit(
            va,
            writable,
            UninitPage::Anonymous {
                source: Some(backing),
            },
        );
        self.insert_page(space, page)
    }

    /// Registers a zero filled page
    pub fn create_anonymous_page(
        &self,
        space: &AddressSpace<T>,
        va: VirtAddr,
        writable: bool,
    ) -> Result<(), VmError> {
        self.check_user_page(va)?;
        let page = Page::new_uninit(va, writable, UninitPage::Anonymous { source: None });
        self.insert_page(space, page)
    }

    fn check_user_page(&self, va: VirtAddr) -> Result<(), VmError> {
        if va.is_null() || va.as_usize() >= self.config.kernel_base {
            return Err(VmError::InvalidAddress(va));
        }
        if !va.is_page_aligned() {
            return Err(VmError::InvalidArgument("page address is not page aligned"));
        }
        Ok(())
    }

    fn insert_page(&self, space: &AddressSpace<T>, page: Page) -> Result<(), VmError> {
        let va = page.va;
        if space.lock().spt.insert(page) {
            Ok(())
        } else {
            Err(VmError::DuplicateMapping(va))
        }
    }

    /// Makes the page containing `va` resident right away
    pub fn claim_page(&self, space: &AddressSpace<T>, va: VirtAddr) -> Result<(), VmError> {
        let mut inner = space.lock();
        fault::claim_page(&self.frames, &mut [&mut *inner], 0, va)
    }

    /// Creates the first stack page below the stack top and returns the
    /// initial stack pointer
    pub fn setup_stack(&self, space: &AddressSpace<T>) -> Result<usize, VmError> {
        let top = self.config.user_stack_top;
        let va = VirtAddr::new(top - PAGE_SIZE);

        let mut inner = space.lock();
        if !inner.spt.insert(Page::new_stack(va)) {
            return Err(VmError::DuplicateMapping(va));
        }

        let claimed = fault::claim_page(&self.frames, &mut [&mut *inner], 0, va);
        if let Err(err) = claimed {
            inner.spt.remove(va);
            return Err(err);
        }

        inner.stack_pointer = top;
        Ok(top)
    }

    /// Maps `length` bytes of `file` starting at `offset` to `addr`, see [`mmap::map`]
    pub fn map_file(
        &self,
        space: &AddressSpace<T>,
        addr: VirtAddr,
        length: usize,
        writable: bool,
        file: &SharedFile,
        offset: usize,
    ) -> Result<VirtAddr, VmError> {
        let mut inner = space.lock();
        mmap::map(&self.config, &mut inner, addr, length, writable, file, offset).map_err(|err| {
            debug!("Rejected mapping at {}: {}", addr, err);
            err
        })
    }

    /// Removes the mapping that starts at `addr`
    pub fn unmap_file(&self, space: &AddressSpace<T>, addr: VirtAddr) -> WritebackReport {
        let mut inner = space.lock();
        mmap::unmap(&self.frames, &mut inner, addr)
    }

    /// Creates a copy of `parent` (fork)
    pub fn clone_address_space(
        &self,
        parent: &AddressSpace<T>,
    ) -> Result<AddressSpace<T>, VmError> {
        let child = self.create_address_space();

        {
            let mut parent_inner = parent.lock();
            let mut child_inner = child.lock();

            if let Err(err) = fork::duplicate(&self.frames, &mut parent_inner, &mut child_inner) {
                warn!(
                    "could not duplicate {:?}: {}, discarding {:?}",
                    parent_inner.id, err, child_inner.id
                );

                let inner = &mut *child_inner;
                inner.spt.discard_all(&self.frames, &mut inner.page_table);
                inner.mappings.clear();
                inner.destroyed = true;
                return Err(err);
            }
        }

        Ok(child)
    }

    /// Tears `space` down: mappings are written back and removed, every
    /// frame and swap slot is released.
    pub fn destroy_address_space(&self, space: AddressSpace<T>) -> WritebackReport {
        let mut inner = space.lock();
        let mut report = WritebackReport::default();

        let mappings: Vec<VirtAddr> = inner.mappings.keys().copied().collect();
        for addr in mappings {
            report.merge(mmap::unmap(&self.frames, &mut inner, addr));
        }

        let inner = &mut *inner;
        report.merge(inner.spt.destroy_all(&self.frames, &mut inner.page_table));
        inner.destroyed = true;

        debug!(
            "Destroyed address space {:?}: {} pages, {} written back",
            inner.id, report.pages_removed, report.pages_written
        );
        report
    }

    /// Reads user memory like the CPU would, raising page faults on the way
    pub fn read_user(
        &self,
        space: &AddressSpace<T>,
        addr: VirtAddr,
        dest: &mut [u8],
    ) -> Result<(), VmError> {
        self.access_user(space, addr, dest.len(), false, |frames, pa, offset, range| {
            frames.read_page(pa, offset, &mut dest[range]);
        })
    }

    /// Writes user memory like the CPU would, raising page faults on the way
    pub fn write_user(
        &self,
        space: &AddressSpace<T>,
        addr: VirtAddr,
        src: &[u8],
    ) -> Result<(), VmError> {
        self.access_user(space, addr, src.len(), true, |frames, pa, offset, range| {
            frames.write_page(pa, offset, &src[range]);
        })
    }

    fn access_user(
        &self,
        space: &AddressSpace<T>,
        addr: VirtAddr,
        len: usize,
        is_write: bool,
        mut access: impl FnMut(&FrameManager<P, E, S, T>, PhysAddr, usize, Range<usize>),
    ) -> Result<(), VmError> {
        let mut done = 0;
        while done < len {
            let va = addr
                .checked_add(done)
                .ok_or(VmError::InvalidAddress(addr))?;
            let chunk = (PAGE_SIZE - va.page_offset()).min(len - done);
            let page = va.page_down();

            let mut inner = space.lock();
            loop {
                let fault = match inner.page_table.translate(page) {
                    Some(pa) if !is_write || inner.page_table.is_writable(page) => {
                        access(&self.frames, pa, va.page_offset(), done..done + chunk);
                        inner.page_table.set_accessed(page, true);
                        if is_write {
                            inner.page_table.set_dirty(page, true);
                        }
                        break;
                    }
                    present => PageFault {
                        addr: va,
                        is_user: true,
                        is_write,
                        not_present: present.is_none(),
                        rsp: inner.stack_pointer,
                    },
                };

                fault::handle_fault(&self.frames, &self.config, &mut inner, &fault)?;
            }

            done += chunk;
        }

        Ok(())
    }

    pub fn stats(&self) -> FrameStats {
        self.frames.stats()
    }
}
