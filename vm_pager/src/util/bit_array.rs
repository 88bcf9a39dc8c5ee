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

use super::div_ceil;

/// Fixed size bitmap, used to track which swap slots are taken
pub(crate) struct BitArray {
    arr: Vec<u8>,
    len: usize,
}

impl BitArray {
    pub(crate) fn new(len: usize) -> Self {
        BitArray {
            arr: vec![0u8; div_ceil(len, 8)],
            len,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn set(&mut self, value: bool, index: usize) {
        debug_assert!(index < self.len);
        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = &mut self.arr[arr_index];
        if value {
            // set bit
            *item |= 1u8 << internal_index;
        } else {
            // unset bit
            *item &= !(1u8 << internal_index);
        }
    }

    pub(crate) fn is_set(&self, index: usize) -> bool {
        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = self.arr[arr_index];
        (item & (1u8 << internal_index)) != 0
    }

    /// Returns the index of the first bit that is not set
    pub(crate) fn first_unset(&self) -> Option<usize> {
        for (byte_index, byte) in self.arr.iter().enumerate() {
            if *byte == u8::MAX {
                continue;
            }

            let index = byte_index * 8 + byte.trailing_ones() as usize;
            if index < self.len {
                return Some(index);
            }
        }

        None
    }

    pub(crate) fn count_set(&self) -> usize {
        self.arr.iter().map(|b| b.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod test {
    use super::BitArray;

    #[test]
    fn test_set_and_unset() {
        let mut bits = BitArray::new(20);
        assert_eq!(bits.len(), 20);
        assert_eq!(bits.first_unset(), Some(0));

        for i in 0..20 {
            bits.set(true, i);
        }
        assert_eq!(bits.first_unset(), None);
        assert_eq!(bits.count_set(), 20);

        bits.set(false, 13);
        assert!(!bits.is_set(13));
        assert!(bits.is_set(12));
        assert!(bits.is_set(14));
        assert_eq!(bits.first_unset(), Some(13));
        assert_eq!(bits.count_set(), 19);
    }

    #[test]
    fn test_len_not_multiple_of_eight() {
        let mut bits = BitArray::new(3);
        for i in 0..3 {
            bits.set(true, i);
        }

        // padding bits of the last byte must never be handed out
        assert_eq!(bits.first_unset(), None);
    }
}
