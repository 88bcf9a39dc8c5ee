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

use super::{EvictionPolicyModule, FrameInspector};

/// Round robin over the frame table, ignores the accessed bits
pub struct DefaultEvictionModule {
    next: usize,
}

impl EvictionPolicyModule for DefaultEvictionModule {
    fn new() -> Self {
        Self { next: 0 }
    }

    fn select_victim(&mut self, frames: &mut dyn FrameInspector) -> Option<usize> {
        let count = frames.slot_count();
        for _ in 0..count {
            let slot = self.next % count;
            self.next = (slot + 1) % count;

            if frames.is_evictable(slot) {
                return Some(slot);
            }
        }

        // could not find any frame that is not in use
        None
    }
}

#[cfg(test)]
mod test {
    use super::DefaultEvictionModule;
    use crate::modules::eviction::{test::TestInspector, EvictionPolicyModule};

    #[test]
    fn test_round_robin() {
        let mut inspector = TestInspector::new(3);
        let mut policy = DefaultEvictionModule::new();

        inspector.accessed = vec![true; 3];
        inspector.evictable[1] = false;

        assert_eq!(policy.select_victim(&mut inspector), Some(0));
        assert_eq!(policy.select_victim(&mut inspector), Some(2));
        assert_eq!(policy.select_victim(&mut inspector), Some(0));

        // accessed bits are left alone
        assert!(inspector.accessed.iter().all(|a| *a));

        inspector.evictable = vec![false; 3];
        assert_eq!(policy.select_victim(&mut inspector), None);
    }
}
