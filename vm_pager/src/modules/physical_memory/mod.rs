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

mod bounded;

pub use bounded::BoundedPhysicalMemoryModule;

use crate::address::PhysAddr;

/// Raw physical page allocator (the user pool of the kernel).
///
/// Hands out whole pages of `PAGE_SIZE` bytes and gives access to their content.
pub trait PhysicalMemoryModule {
    /// Allocates a new page, returns `None` if the pool is exhausted.
    ///
    /// If `zeroed` is `false` the content of the page is undefined.
    fn alloc_page(&mut self, zeroed: bool) -> Option<PhysAddr>;

    /// Gives a page back to the pool
    fn free_page(&mut self, page: PhysAddr);

    /// Content of an allocated page
    fn page(&self, page: PhysAddr) -> &[u8];

    /// Mutable content of an allocated page
    fn page_mut(&mut self, page: PhysAddr) -> &mut [u8];

    /// Maximum number of pages this pool can hand out at the same time
    fn capacity(&self) -> usize;
}
