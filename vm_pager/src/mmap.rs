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

use log::{debug, warn};

use crate::{
    address::{VirtAddr, PAGE_SIZE},
    address_space::{AddressSpaceInner, MappingRegion},
    error::{VmError, WritebackReport},
    frame_manager::FrameManager,
    modules::{
        eviction::EvictionPolicyModule, file_system::SharedFile, page_table::PageTableModule,
        persistent_storage::PersistentStorageModule, physical_memory::PhysicalMemoryModule,
    },
    page::{FileBacking, Page, PageKind, UninitPage},
    util::{div_ceil, round_up_to_nearest},
    vm_config::VmConfig,
};

/// Maps `length` bytes of `file` starting at `offset` to `addr`.
///
/// Pages are only created, nothing is read until the first access.
/// The mapping works on its own handle of the file, closing `file` afterwards
/// does not affect it.
pub(crate) fn map<T: PageTableModule>(
    config: &VmConfig,
    inner: &mut AddressSpaceInner<T>,
    addr: VirtAddr,
    length: usize,
    writable: bool,
    file: &SharedFile,
    offset: usize,
) -> Result<VirtAddr, VmError> {
    if addr.is_null() {
        return Err(VmError::InvalidAddress(addr));
    }
    if !addr.is_page_aligned() {
        return Err(VmError::InvalidArgument("mapping address is not page aligned"));
    }
    if length == 0 {
        return Err(VmError::InvalidArgument("mapping length is zero"));
    }
    if offset % PAGE_SIZE != 0 {
        return Err(VmError::InvalidArgument("file offset is not page aligned"));
    }

    let file_len = file.len();
    if offset >= file_len {
        return Err(VmError::InvalidArgument("file offset lies beyond the end of file"));
    }

    if length > config.kernel_base {
        return Err(VmError::InvalidAddress(addr));
    }

    // whole pages are mapped
    let end = addr
        .checked_add(round_up_to_nearest(length, PAGE_SIZE))
        .ok_or(VmError::InvalidAddress(addr))?;
    if end.as_usize() > config.kernel_base {
        return Err(VmError::InvalidAddress(addr));
    }
    if let Some(existing) = inner.spt.first_in(addr, length) {
        return Err(VmError::DuplicateMapping(existing));
    }

    let file = file
        .reopen()
        .map_err(|_| VmError::BackingStore("could not reopen file"))?;

    let page_count = div_ceil(length, PAGE_SIZE);
    let mut remaining = length.min(file_len - offset);

    for i in 0..page_count {
        let read_bytes = remaining.min(PAGE_SIZE);
        remaining -= read_bytes;

        let backing = FileBacking::new(
            file.clone(),
            offset + i * PAGE_SIZE,
            read_bytes,
            PAGE_SIZE - read_bytes,
        )?;

        let va = VirtAddr::new(addr.as_usize() + i * PAGE_SIZE);
        let mut page = Page::new_uninit(va, writable, UninitPage::FileBacked(backing));
        page.mapping = Some(addr);

        // checked for overlaps above
        let inserted = inner.spt.insert(page);
        debug_assert!(inserted);
    }

    inner.mappings.insert(addr, MappingRegion { page_count });
    debug!(
        "Mapped file {} at {} ({} pages) into {:?}",
        file.file_id(),
        addr,
        page_count,
        inner.id
    );

    Ok(addr)
}

/// Removes the mapping starting at `addr`, writing modified pages back first.
///
/// Unknown addresses are ignored. Pages that could not be written back are
/// listed in the report, their changes are lost.
pub(crate) fn unmap<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    inner: &mut AddressSpaceInner<T>,
    addr: VirtAddr,
) -> WritebackReport
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    let mut report = WritebackReport::default();

    let region = match inner.mappings.remove(&addr) {
        Some(region) => region,
        None => {
            warn!("ignored unmap of {}, no mapping starts there", addr);
            return report;
        }
    };

    let mut previous: Option<FileBacking> = None;
    for i in 0..region.page_count {
        let va = VirtAddr::new(addr.as_usize() + i * PAGE_SIZE);

        let page = match inner.spt.remove(va) {
            Some(page) => page,
            None => {
                warn!("page {} of mapping {} is missing", va, addr);
                continue;
            }
        };
        debug_assert_eq!(page.mapping, Some(addr));

        if let (Some(previous), Some(current)) = (&previous, page.file_backing()) {
            debug_assert!(previous.is_followed_by(current));
        }
        previous = page.file_backing().cloned();

        match writeback_page(frames, &mut inner.page_table, &page) {
            Ok(true) => report.pages_written += 1,
            Ok(false) => {}
            Err(err) => {
                warn!("could not write back page {}: {}", va, err);
                report.failed.push(va);
            }
        }

        crate::spt::destroy_page(page, frames, &mut inner.page_table);
        report.pages_removed += 1;
    }

    debug!(
        "Unmapped {} from {:?}: {} pages, {} written",
        addr, inner.id, report.pages_removed, report.pages_written
    );
    report
}

/// Writes `page` back to its file if it is a resident file page with the dirty bit set.
/// Clears the dirty bit on success.
///
/// Returns whether anything was written.
pub(crate) fn writeback_page<P, E, S, T>(
    frames: &FrameManager<P, E, S, T>,
    page_table: &mut T,
    page: &Page,
) -> Result<bool, VmError>
where
    P: PhysicalMemoryModule,
    E: EvictionPolicyModule,
    S: PersistentStorageModule,
    T: PageTableModule,
{
    let backing = match &page.kind {
        PageKind::FileBacked(backing) => backing,
        _ => return Ok(false),
    };

    let frame = match page.frame {
        Some(frame) => frame,
        None => return Ok(false),
    };

    if !page_table.is_dirty(page.va) {
        return Ok(false);
    }

    let mut buffer = vec![0u8; PAGE_SIZE];
    frames.read_page(frame.pa, 0, &mut buffer);
    backing.write_back(&buffer)?;

    page_table.set_dirty(page.va, false);
    Ok(true)
}
