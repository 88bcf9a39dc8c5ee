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

mod clock;
mod default;

pub use clock::ClockEvictionModule;
pub use default::DefaultEvictionModule;

/// View onto the frame table that an eviction policy uses to pick a victim.
///
/// Frames are identified by their slot in the frame table, slots are stable
/// as long as a frame is alive.
pub trait FrameInspector {
    /// Number of slots in the frame table (some of them may be empty)
    fn slot_count(&self) -> usize;

    /// Can the frame in `slot` be evicted right now?
    ///
    /// This is `false` for empty slots, frames that are currently being
    /// claimed and frames whose owner is busy in another thread.
    fn is_evictable(&mut self, slot: usize) -> bool;

    /// Returns whether the frame in `slot` was accessed since the last call
    /// and clears that information.
    fn test_and_clear_accessed(&mut self, slot: usize) -> bool;
}

/// Eviction policy used by the frame manager once the physical pool is exhausted
pub trait EvictionPolicyModule {
    fn new() -> Self;

    /// Picks an evictable frame or `None` if there is none
    fn select_victim(&mut self, frames: &mut dyn FrameInspector) -> Option<usize>;
}
