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

/// Configuration of the virtual memory subsystem
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// First virtual address that belongs to the kernel.
    /// Faults at or above this address are never resolved.
    pub kernel_base: usize,

    /// Highest address (exclusive) of the user stack
    pub user_stack_top: usize,

    /// How far the stack may grow below `user_stack_top`
    pub max_stack_size: usize,

    /// How many bytes below the stack pointer an access may be and still
    /// count as stack access (one push)
    pub stack_slack: usize,

    /// How often a frame request backs off while all eviction candidates
    /// are locked by other threads before it fails with out of memory
    pub eviction_retries: usize,
}

impl VmConfig {
    /// Lowest address a stack page may start at
    #[inline]
    pub fn stack_floor(&self) -> usize {
        self.user_stack_top - self.max_stack_size
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            kernel_base: 0x80_0400_0000,
            user_stack_top: 0x4748_0000,
            max_stack_size: 1 << 20,
            stack_slack: 8,
            eviction_retries: 1024,
        }
    }
}
