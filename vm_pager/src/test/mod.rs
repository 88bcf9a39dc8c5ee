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
    modules::{
        persistent_storage::{test::get_test_storage, FilePersistentStorageModule},
        physical_memory::BoundedPhysicalMemoryModule,
    },
    DefaultVm, VirtAddr, Vm, VmConfig, PAGE_SIZE,
};

mod eviction;
mod stack;

pub(crate) type TestVm = DefaultVm<FilePersistentStorageModule>;

/// Where tests place code and data pages
pub(crate) const USER_BASE: usize = 0x40_0000;

pub(crate) fn get_test_vm(test_name: &str, frames: usize, swap_pages: usize) -> TestVm {
    let _ = env_logger::builder().is_test(true).try_init();

    let storage = get_test_storage(test_name, swap_pages * PAGE_SIZE);
    Vm::new(
        BoundedPhysicalMemoryModule::new(frames),
        storage,
        VmConfig::default(),
    )
}

pub(crate) fn user_page(i: usize) -> VirtAddr {
    VirtAddr::new(USER_BASE + i * PAGE_SIZE)
}
