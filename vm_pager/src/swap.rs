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

use log::{trace, warn};

use crate::{
    address::PAGE_SIZE, error::VmError, modules::persistent_storage::PersistentStorageModule,
    util::bit_array::BitArray,
};

/// One page sized slot of the swap area
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SwapSlot(usize);

impl SwapSlot {
    #[inline]
    fn offset(&self) -> usize {
        self.0 * PAGE_SIZE
    }
}

/// Swap area: the storage is divided into page sized slots
pub(crate) struct SwapTable<S: PersistentStorageModule> {
    storage: S,

    /// Bit is set if the slot holds a swapped out page
    used: BitArray,
}

impl<S: PersistentStorageModule> SwapTable<S> {
    pub(crate) fn new(storage: S) -> Self {
        let slot_count = storage.get_max_size() / PAGE_SIZE;
        Self {
            storage,
            used: BitArray::new(slot_count),
        }
    }

    /// Writes `page` into a free slot.
    ///
    /// Fails with `OutOfMemory` if the swap area is full.
    pub(crate) fn swap_out(&mut self, page: &[u8]) -> Result<SwapSlot, VmError> {
        debug_assert_eq!(page.len(), PAGE_SIZE);

        let slot = SwapSlot(self.used.first_unset().ok_or(VmError::OutOfMemory)?);
        self.storage
            .write(slot.offset(), page)
            .map_err(|_| VmError::BackingStore("could not write to swap"))?;

        self.used.set(true, slot.0);
        trace!("Swapped out page to slot {}", slot.0);
        Ok(slot)
    }

    /// Reads the page in `slot` into `dest` and frees the slot.
    ///
    /// If reading fails, the slot stays occupied.
    pub(crate) fn swap_in(&mut self, slot: SwapSlot, dest: &mut [u8]) -> Result<(), VmError> {
        debug_assert!(self.used.is_set(slot.0), "swap slot {} is not in use", slot.0);

        self.storage
            .read(slot.offset(), dest)
            .map_err(|_| VmError::BackingStore("could not read from swap"))?;

        self.used.set(false, slot.0);
        trace!("Swapped in page from slot {}", slot.0);
        Ok(())
    }

    /// Discards the content of `slot`
    pub(crate) fn free(&mut self, slot: SwapSlot) {
        if !self.used.is_set(slot.0) {
            warn!("swap slot {} freed twice", slot.0);
            return;
        }
        self.used.set(false, slot.0);
    }

    pub(crate) fn used_slots(&self) -> usize {
        self.used.count_set()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.used.len()
    }
}

#[cfg(test)]
mod test {
    use super::SwapTable;
    use crate::{
        address::PAGE_SIZE,
        error::VmError,
        modules::persistent_storage::{test::get_test_storage, TruncatedStorageModule},
    };

    #[test]
    fn test_swap_round_trip_frees_slot() {
        let mut swap = SwapTable::new(get_test_storage(
            "swap_test_swap_round_trip_frees_slot",
            4 * PAGE_SIZE,
        ));
        assert_eq!(swap.slot_count(), 4);

        let page_a = vec![1u8; PAGE_SIZE];
        let page_b = vec![2u8; PAGE_SIZE];
        let slot_a = swap.swap_out(&page_a).unwrap();
        let slot_b = swap.swap_out(&page_b).unwrap();
        assert_ne!(slot_a, slot_b);
        assert_eq!(swap.used_slots(), 2);

        let mut buf = vec![0u8; PAGE_SIZE];
        swap.swap_in(slot_b, &mut buf).unwrap();
        assert_eq!(buf, page_b);
        assert_eq!(swap.used_slots(), 1);

        swap.free(slot_a);
        assert_eq!(swap.used_slots(), 0);
    }

    #[test]
    fn test_swap_full() {
        let storage = get_test_storage("swap_test_swap_full", 4 * PAGE_SIZE);
        let mut swap = SwapTable::new(TruncatedStorageModule::<PAGE_SIZE, _>::new(storage));

        let page = vec![3u8; PAGE_SIZE];
        let slot = swap.swap_out(&page).unwrap();
        assert_eq!(swap.swap_out(&page), Err(VmError::OutOfMemory));

        swap.free(slot);
        swap.swap_out(&page).unwrap();
    }
}
