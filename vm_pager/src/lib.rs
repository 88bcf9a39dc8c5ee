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

mod address;
mod address_space;
mod error;
mod fault;
mod fork;
mod frame_manager;
mod mmap;
mod page;
mod spt;
mod swap;
mod util;
mod vm;
mod vm_config;

#[cfg(test)]
mod test;

pub use address::{PhysAddr, VirtAddr, PAGE_SIZE};
pub use address_space::{AddressSpace, AddressSpaceId};
pub use error::{VmError, WritebackReport};
pub use fault::PageFault;
pub use frame_manager::{Frame, FrameStats};
pub use page::{FileBacking, Page, PageKind, PageType, UninitPage};
pub use spt::SupplementalPageTable;
pub use swap::SwapSlot;
pub use vm::{DefaultVm, Vm};
pub use vm_config::VmConfig;
pub mod modules;
