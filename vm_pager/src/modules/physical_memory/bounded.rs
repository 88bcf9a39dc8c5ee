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

use log::error;

use super::PhysicalMemoryModule;
use crate::address::{PhysAddr, PAGE_SIZE};

/// Physical addresses handed out by this module start here
const POOL_BASE: usize = 0x10_0000;

/// A pool of a fixed number of page frames that lives in host memory
pub struct BoundedPhysicalMemoryModule {
    /// Backing buffers, created on first allocation of that page
    pages: Vec<Option<Box<[u8]>>>,

    /// Indices of `pages` that are not handed out right now
    free: Vec<usize>,
}

impl BoundedPhysicalMemoryModule {
    pub fn new(page_count: usize) -> Self {
        Self {
            pages: (0..page_count).map(|_| None).collect(),
            // reversed, so that pages are handed out in ascending order
            free: (0..page_count).rev().collect(),
        }
    }

    #[inline]
    fn index_of(&self, page: PhysAddr) -> usize {
        debug_assert!(page.as_usize() >= POOL_BASE);
        (page.as_usize() - POOL_BASE) / PAGE_SIZE
    }

    /// How many pages can still be allocated
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl PhysicalMemoryModule for BoundedPhysicalMemoryModule {
    fn alloc_page(&mut self, zeroed: bool) -> Option<PhysAddr> {
        let index = self.free.pop()?;
        let page = self.pages[index].get_or_insert_with(|| vec![0u8; PAGE_SIZE].into_boxed_slice());
        if zeroed {
            page.fill(0);
        }

        Some(PhysAddr::new(POOL_BASE + index * PAGE_SIZE))
    }

    fn free_page(&mut self, page: PhysAddr) {
        let index = self.index_of(page);
        if self.free.contains(&index) {
            error!("double free of physical page {:?}", page);
            debug_assert!(false, "double free of physical page {:?}", page);
            return;
        }

        self.free.push(index);
    }

    fn page(&self, page: PhysAddr) -> &[u8] {
        let index = self.index_of(page);
        match &self.pages[index] {
            Some(buf) => buf,
            None => panic!("access to page {:?} that was never allocated", page),
        }
    }

    fn page_mut(&mut self, page: PhysAddr) -> &mut [u8] {
        let index = self.index_of(page);
        match &mut self.pages[index] {
            Some(buf) => buf,
            None => panic!("access to page {:?} that was never allocated", page),
        }
    }

    fn capacity(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod test {
    use super::BoundedPhysicalMemoryModule;
    use crate::modules::physical_memory::PhysicalMemoryModule;

    #[test]
    fn test_pool_is_bounded() {
        let mut pool = BoundedPhysicalMemoryModule::new(3);
        let pages: Vec<_> = (0..3).map(|_| pool.alloc_page(true).unwrap()).collect();
        assert!(pool.alloc_page(true).is_none());
        assert_eq!(pool.free_count(), 0);

        pool.free_page(pages[1]);
        assert_eq!(pool.alloc_page(false), Some(pages[1]));
    }

    #[test]
    fn test_zeroed_allocation() {
        let mut pool = BoundedPhysicalMemoryModule::new(1);
        let page = pool.alloc_page(true).unwrap();
        pool.page_mut(page)[10] = 0xAB;
        pool.free_page(page);

        // not zeroed: stale content survives
        let page = pool.alloc_page(false).unwrap();
        assert_eq!(pool.page(page)[10], 0xAB);
        pool.free_page(page);

        let page = pool.alloc_page(true).unwrap();
        assert!(pool.page(page).iter().all(|b| *b == 0));
    }
}
