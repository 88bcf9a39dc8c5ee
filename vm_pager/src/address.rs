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

use core::fmt;

use static_assertions::const_assert;

/// Size of one virtual page and of one physical frame
pub const PAGE_SIZE: usize = 4096;

const_assert!(PAGE_SIZE.is_power_of_two());

const PAGE_MASK: usize = PAGE_SIZE - 1;

/// A user virtual address. Page descriptors are keyed by the page-aligned form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtAddr(usize);

impl VirtAddr {
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn as_usize(&self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Rounds down to the start of the containing page
    #[inline]
    pub const fn page_down(&self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    #[inline]
    pub const fn is_page_aligned(&self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    #[inline]
    pub const fn page_offset(&self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Virtual page number
    #[inline]
    pub const fn vpn(&self) -> usize {
        self.0 / PAGE_SIZE
    }

    #[inline]
    pub const fn from_vpn(vpn: usize) -> Self {
        Self(vpn * PAGE_SIZE)
    }

    /// Returns `None` on overflow
    #[inline]
    pub fn checked_add(&self, bytes: usize) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Address of a physical frame as handed out by the raw physical allocator
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(usize);

impl PhysAddr {
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::{VirtAddr, PAGE_SIZE};

    #[test]
    fn test_page_rounding() {
        let addr = VirtAddr::new(3 * PAGE_SIZE + 17);
        assert_eq!(addr.page_down(), VirtAddr::new(3 * PAGE_SIZE));
        assert_eq!(addr.page_offset(), 17);
        assert_eq!(addr.vpn(), 3);
        assert!(!addr.is_page_aligned());
        assert!(addr.page_down().is_page_aligned());
        assert_eq!(VirtAddr::from_vpn(3), addr.page_down());
    }

    #[test]
    fn test_checked_add_overflow() {
        assert!(VirtAddr::new(usize::MAX).checked_add(1).is_none());
        assert_eq!(
            VirtAddr::new(PAGE_SIZE).checked_add(PAGE_SIZE),
            Some(VirtAddr::new(2 * PAGE_SIZE))
        );
    }
}
