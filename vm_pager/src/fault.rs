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
    address::{VirtAddr, PAGE_SIZE},
    address_space::AddressSpaceInner,
    error::VmError,
    frame_manager::{Frame, FrameManager},
    modules::{
        eviction::EvictionPolicyModule, page_table::PageTableModule,
        persistent_storage::PersistentStorageModule, physical_memory::PhysicalMemoryModule,
    },
    page::{FileBacking, Page, PageKind, UninitPage},
    spt::SupplementalPageTable,
    vm_config::VmConfig,
};

/// Page fault as reported by the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFault {
    /// Faulting address
    pub addr: VirtAddr,

    /// Fault was raised while running user code
    pub is_user: bool,

    pub is_write: bool,

    /// `false` for protection violations on present pages
    pub not_present: bool,

    /// Stack pointer at the time of the fault, only meaningful for user faults
    pub rsp: usize,
}

impl PageFault {
    pub fn user_read(addr: VirtAddr, rsp: usize) -> Self {
        Self {
            addr,
            is_user: true,
            is_write: false,
            not_present: true,
            rsp,
        }
    }

    pub fn user_write(addr: VirtAddr, rsp: usize) -> Self {
        Self {
            addr,
            is_user: true,
            is_write: true,
            not_present: true,
            rsp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FaultClass {
    Rejected(VmError),

    /// Access just below the stack, a new stack page is needed
    StackGrowth,

    /// Page is known, load it
    LazyPopulate,

    /// Protection fault on a resident page
    AlreadyResident,
}

/// Decides how a fault at `fault.addr` is handled.
/// `rsp` is the user stack pointer to check stack accesses against.
pub(crate) fn classify(
    config: &VmConfig,
    spt: &SupplementalPageTable,
    fault: &PageFault,
    rsp: usize,
) -> FaultClass {
    let addr = fault.addr;
    if addr.is_null() || addr.as_usize() >= config.kernel_base {
        return FaultClass::Rejected(VmError::InvalidAddress(addr));
    }

    if !fault.not_present {
        return match spt.find(addr) {
            Some(page) if page.is_resident() => FaultClass::AlreadyResident,
            _ => FaultClass::Rejected(VmError::InvalidAddress(addr)),
        };
    }

    if let Some(page) = spt.find(addr) {
        if fault.is_write && !page.is_writable() {
            return FaultClass::Rejected(VmError::WriteProtected(addr.page_down()));
        }
        return FaultClass::LazyPopulate;
    }

    if is_stack_access(config, fault, rsp) {
        FaultClass::StackGrowth
    } else {
        FaultClass::Rejected(VmError::InvalidAddress(addr))
    }
}

fn is_stack_access(config: &VmConfig, fault: &PageFault, rsp: usize) -> bool {
    let addr = fault.addr.as_usize();

    fault.is_write
        && addr >= config.stack_floor()
        && addr < config.user_stack_top
        && addr.saturating_add(config.stack_slack) >= rsp
}

/// Resolves `fault` in the address space `inner`
pub(crate) fn handle_fault<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    config: &VmConfig,
    inner: &mut AddressSpaceInner<T>,
    fault: &PageFault,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    // kernel code runs on the kernel stack, use the pointer saved on entry
    let rsp = if fault.is_user {
        fault.rsp
    } else {
        inner.stack_pointer
    };

    match classify(config, &inner.spt, fault, rsp) {
        FaultClass::Rejected(err) => {
            debug!("Rejected fault at {} of {:?}: {}", fault.addr, inner.id, err);
            Err(err)
        }
        FaultClass::AlreadyResident => Err(VmError::WriteProtected(fault.addr.page_down())),
        FaultClass::LazyPopulate => claim_page(frames, &mut [inner], 0, fault.addr),
        FaultClass::StackGrowth => grow_stack(frames, config, inner, fault.addr),
    }
}

/// Makes the page containing `va` of `held[index]` resident.
///
/// Does nothing if the page already is resident. On failure the page keeps
/// its state and no frame is leaked.
pub(crate) fn claim_page<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    held: &mut [&mut AddressSpaceInner<T>],
    index: usize,
    va: VirtAddr,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    let va = va.page_down();
    match held[index].spt.find(va) {
        Some(page) if page.is_resident() => return Ok(()),
        Some(_) => {}
        None => return Err(VmError::InvalidAddress(va)),
    }

    let frame = frames.acquire_frame(held, index, va)?;

    match populate(frames, &mut *held[index], va, frame) {
        Ok(()) => {
            frames.unpin(frame);
            trace!("Claimed page {} with frame {}", va, frame.slot);
            Ok(())
        }
        Err(err) => {
            frames.release_frame(frame);
            Err(err)
        }
    }
}

/// Fills `frame` with the content of page `va` and maps it
fn populate<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    inner: &mut AddressSpaceInner<T>,
    va: VirtAddr,
    frame: Frame,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    if inner.page_table.translate(va).is_some() {
        return Err(VmError::DuplicateMapping(va));
    }

    let page = inner
        .spt
        .find_mut(va)
        .ok_or(VmError::InvalidAddress(va))?;

    // the frame arrives zeroed
    let loaded = match &page.kind {
        PageKind::Uninit(UninitPage::Anonymous { source: None }) => {
            PageKind::Anonymous { swap_slot: None }
        }
        PageKind::Uninit(UninitPage::Anonymous {
            source: Some(backing),
        }) => {
            load_file_page(frames, backing, frame)?;
            PageKind::Anonymous { swap_slot: None }
        }
        PageKind::Uninit(UninitPage::FileBacked(backing)) | PageKind::FileBacked(backing) => {
            load_file_page(frames, backing, frame)?;
            PageKind::FileBacked(backing.clone())
        }
        PageKind::Anonymous { swap_slot } => {
            if let Some(slot) = swap_slot {
                frames.swap_in(*slot, frame)?;
            }
            PageKind::Anonymous { swap_slot: None }
        }
        PageKind::Stack { swap_slot } => {
            if let Some(slot) = swap_slot {
                frames.swap_in(*slot, frame)?;
            }
            PageKind::Stack { swap_slot: None }
        }
    };

    page.kind = loaded;
    page.frame = Some(frame);

    let mapped = inner.page_table.map(va, frame.pa, page.writable);
    debug_assert!(mapped);
    Ok(())
}

fn load_file_page<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    backing: &FileBacking,
    frame: Frame,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    let mut buffer = vec![0u8; PAGE_SIZE];
    backing.load(&mut buffer)?;
    frames.write_page(frame.pa, 0, &buffer);
    Ok(())
}

/// Creates stack pages from the page containing `addr` up to the lowest
/// existing stack page and claims them all.
/// Either every new page is resident afterwards or none was added.
pub(crate) fn grow_stack<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    config: &VmConfig,
    inner: &mut AddressSpaceInner<T>,
    addr: VirtAddr,
) -> Result<(), VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    let mut added = Vec::new();
    let mut va = addr.page_down();
    while va.as_usize() < config.user_stack_top && !inner.spt.contains(va) {
        inner.spt.insert(Page::new_stack(va));
        added.push(va);
        va = VirtAddr::new(va.as_usize() + PAGE_SIZE);
    }

    debug!("Growing stack of {:?} by {} pages", inner.id, added.len());

    // the faulting page is claimed last, so it is still resident afterwards
    let mut held = [inner];
    for va in added.iter().rev() {
        if let Err(err) = claim_page(frames, &mut held, 0, *va) {
            debug!("Stack growth failed at {}: {}", va, err);

            let inner = &mut *held[0];
            for va in &added {
                inner.spt.remove_and_destroy(*va, frames, &mut inner.page_table);
            }
            return Err(err);
        }
    }

    Ok(())
}
