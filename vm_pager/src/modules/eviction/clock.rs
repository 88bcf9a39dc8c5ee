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

/// Second chance (clock) algorithm.
///
/// The hand sweeps over the frame table. A frame that was accessed since the
/// hand last passed it loses its accessed bit and is skipped once, the first
/// evictable frame without accessed bit is chosen.
pub struct ClockEvictionModule {
    hand: usize,
}

impl EvictionPolicyModule for ClockEvictionModule {
    fn new() -> Self {
        Self { hand: 0 }
    }

    fn select_victim(&mut self, frames: &mut dyn FrameInspector) -> Option<usize> {
        let count = frames.slot_count();
        if count == 0 {
            return None;
        }

        // after one full sweep every accessed bit is cleared,
        // so the second sweep finds a victim if there is one
        for _ in 0..2 * count {
            let slot = self.hand % count;
            self.hand = (slot + 1) % count;

            if !frames.is_evictable(slot) {
                continue;
            }

            if frames.test_and_clear_accessed(slot) {
                // page was accessed, give it another chance
                continue;
            }

            // page lost its chance, choose it
            return Some(slot);
        }

        None
    }
}

#[cfg(test)]
mod test {
    use super::ClockEvictionModule;
    use crate::modules::eviction::{test::TestInspector, EvictionPolicyModule};

    #[test]
    fn test_second_chance() {
        let mut inspector = TestInspector::new(4);
        let mut policy = ClockEvictionModule::new();

        inspector.accessed = vec![true, false, true, false];
        assert_eq!(policy.select_victim(&mut inspector), Some(1));

        // frame 0 lost its accessed bit on the first sweep
        assert!(!inspector.accessed[0]);
        assert_eq!(policy.select_victim(&mut inspector), Some(3));
        assert_eq!(policy.select_victim(&mut inspector), Some(0));
    }

    #[test]
    fn test_all_accessed_still_finds_victim() {
        let mut inspector = TestInspector::new(3);
        let mut policy = ClockEvictionModule::new();

        inspector.accessed = vec![true; 3];
        assert_eq!(policy.select_victim(&mut inspector), Some(0));
        assert!(inspector.accessed.iter().all(|a| !*a));
    }

    #[test]
    fn test_nothing_evictable() {
        let mut inspector = TestInspector::new(3);
        let mut policy = ClockEvictionModule::new();

        inspector.evictable = vec![false; 3];
        assert_eq!(policy.select_victim(&mut inspector), None);

        let mut empty = TestInspector::new(0);
        assert_eq!(policy.select_victim(&mut empty), None);
    }
}
