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

use thiserror::Error;

use crate::address::VirtAddr;

/// Errors of the virtual memory core.
///
/// Every error returned from fault resolution is fatal for the faulting
/// process only. Frame pool and all other address spaces stay consistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Kernel address, null address or unmapped address that may not grow the stack
    #[error("invalid address {0}")]
    InvalidAddress(VirtAddr),

    /// Write access to a page that is mapped read only
    #[error("write to read-only page at {0}")]
    WriteProtected(VirtAddr),

    /// No free frame and eviction could not produce one
    #[error("out of memory")]
    OutOfMemory,

    /// Reading from or writing to a file or to swap failed
    #[error("backing store error: {0}")]
    BackingStore(&'static str),

    /// There already is a page descriptor for this address
    #[error("page {0} is already mapped")]
    DuplicateMapping(VirtAddr),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Outcome of a teardown that writes dirty file-backed pages back.
///
/// Teardown itself never fails, failed writebacks are only reported here.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WritebackReport {
    /// Number of page descriptors that were removed
    pub pages_removed: usize,

    /// Number of dirty pages that were written back successfully
    pub pages_written: usize,

    /// Pages whose modified content could not be written back
    pub failed: Vec<VirtAddr>,
}

impl WritebackReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn merge(&mut self, other: WritebackReport) {
        self.pages_removed += other.pages_removed;
        self.pages_written += other.pages_written;
        self.failed.extend(other.failed);
    }
}
