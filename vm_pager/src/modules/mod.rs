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

//! Collaborators of the virtual memory core.
//!
//! Each concern the core consumes but does not implement itself
//! (physical pages, the hardware page table, swap blocks, files and the
//! eviction policy) is expressed as a module trait, so that the core can be
//! driven by a real kernel as well as by the host implementations found here.

pub mod eviction;
pub mod file_system;
pub mod page_table;
pub mod persistent_storage;
pub mod physical_memory;
