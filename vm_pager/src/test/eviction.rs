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

use rand::{rngs::SmallRng, RngCore, SeedableRng};

use super::{get_test_vm, user_page};
use crate::{
    modules::file_system::{FileSystemModule, MemoryFileSystemModule},
    VmError, PAGE_SIZE,
};

#[test]
fn test_more_pages_than_frames() {
    const FRAMES: usize = 4;
    const PAGES: usize = 32;
    const SEED: u64 = 5446535461589659585;

    let vm = get_test_vm("test_more_pages_than_frames", FRAMES, PAGES);
    let mut rand = SmallRng::seed_from_u64(SEED);

    let space = vm.create_address_space();
    let mut contents = Vec::new();
    for i in 0..PAGES {
        let mut data = vec![0u8; PAGE_SIZE];
        rand.fill_bytes(&mut data);

        vm.create_anonymous_page(&space, user_page(i), true)
            .unwrap();
        vm.write_user(&space, user_page(i), &data).unwrap();
        contents.push(data);
    }

    let stats = vm.stats();
    assert_eq!(stats.frames_used, FRAMES);
    assert_eq!(stats.swap_slots_used, PAGES - FRAMES);
    assert_eq!(space.resident_count(), FRAMES);

    // read back in random order
    let mut buffer = vec![0u8; PAGE_SIZE];
    for _ in 0..2 * PAGES {
        let i = rand.next_u32() as usize % PAGES;
        vm.read_user(&space, user_page(i), &mut buffer).unwrap();
        assert_eq!(buffer, contents[i], "page {} differs", i);
    }
    assert!(vm.stats().evictions >= PAGES - FRAMES);

    vm.destroy_address_space(space);
    let stats = vm.stats();
    assert_eq!(stats.frames_used, 0);
    assert_eq!(stats.swap_slots_used, 0);
}

#[test]
fn test_page_crossing_access() {
    let vm = get_test_vm("test_page_crossing_access", 1, 4);
    let space = vm.create_address_space();
    vm.create_anonymous_page(&space, user_page(0), true)
        .unwrap();
    vm.create_anonymous_page(&space, user_page(1), true)
        .unwrap();

    // both pages are needed, but only one frame exists
    let addr = crate::VirtAddr::new(user_page(1).as_usize() - 3);
    vm.write_user(&space, addr, b"across").unwrap();

    let mut buffer = [0u8; 6];
    vm.read_user(&space, addr, &mut buffer).unwrap();
    assert_eq!(&buffer, b"across");

    vm.destroy_address_space(space);
}

#[test]
fn test_dirty_file_page_is_written_on_eviction() {
    let vm = get_test_vm("test_dirty_file_page_is_written_on_eviction", 1, 4);
    let fs = MemoryFileSystemModule::new();
    fs.create_with("data", b"evict me");
    let file = fs.open("data").unwrap();

    let space = vm.create_address_space();
    let addr = user_page(0x10);
    vm.map_file(&space, addr, 8, true, &file, 0).unwrap();
    vm.create_anonymous_page(&space, user_page(0), true)
        .unwrap();

    vm.write_user(&space, addr, b"E").unwrap();
    vm.write_user(&space, user_page(0), b"anon").unwrap();
    assert!(!space.is_resident(addr));
    assert_eq!(fs.content("data").unwrap(), b"Evict me");

    // file pages never take a swap slot
    let mut buffer = [0u8; 8];
    vm.read_user(&space, addr, &mut buffer).unwrap();
    assert_eq!(&buffer, b"Evict me");
    assert_eq!(vm.stats().swap_slots_used, 1);

    // the page is clean again, unmapping writes nothing
    let report = vm.unmap_file(&space, addr);
    assert_eq!(report.pages_written, 0);

    vm.destroy_address_space(space);
}

#[test]
fn test_clean_file_page_is_dropped_on_eviction() {
    let vm = get_test_vm("test_clean_file_page_is_dropped_on_eviction", 1, 4);
    let fs = MemoryFileSystemModule::new();
    fs.create_with("data", b"read only");
    fs.set_read_only("data", true).unwrap();
    let file = fs.open("data").unwrap();

    let space = vm.create_address_space();
    let addr = user_page(0x10);
    vm.map_file(&space, addr, 9, true, &file, 0).unwrap();
    vm.create_anonymous_page(&space, user_page(0), true)
        .unwrap();

    let mut buffer = [0u8; 9];
    vm.read_user(&space, addr, &mut buffer).unwrap();

    // writing the clean page back would fail, so this only works without writeback
    vm.write_user(&space, user_page(0), b"anon").unwrap();
    assert!(!space.is_resident(addr));
    assert_eq!(vm.stats().swap_slots_used, 0);

    vm.destroy_address_space(space);
}

#[test]
fn test_failed_writeback_keeps_page_resident() {
    let vm = get_test_vm("test_failed_writeback_keeps_page_resident", 1, 4);
    let fs = MemoryFileSystemModule::new();
    fs.create_with("data", b"original");
    let file = fs.open("data").unwrap();

    let space = vm.create_address_space();
    let addr = user_page(0x10);
    vm.map_file(&space, addr, 8, true, &file, 0).unwrap();
    vm.create_anonymous_page(&space, user_page(0), true)
        .unwrap();

    vm.write_user(&space, addr, b"CHANGED!").unwrap();
    fs.set_read_only("data", true).unwrap();

    assert_eq!(
        vm.write_user(&space, user_page(0), b"anon"),
        Err(VmError::OutOfMemory)
    );
    assert!(space.is_resident(addr));

    let mut buffer = [0u8; 8];
    vm.read_user(&space, addr, &mut buffer).unwrap();
    assert_eq!(&buffer, b"CHANGED!");

    fs.set_read_only("data", false).unwrap();
    let report = vm.destroy_address_space(space);
    assert_eq!(report.pages_written, 1);
    assert_eq!(fs.content("data").unwrap(), b"CHANGED!");
}

#[test]
fn test_pages_of_other_address_spaces_are_evicted() {
    let vm = get_test_vm("test_pages_of_other_address_spaces_are_evicted", 2, 8);

    let first = vm.create_address_space();
    let second = vm.create_address_space();
    for space in [&first, &second] {
        for i in 0..2 {
            vm.create_anonymous_page(space, user_page(i), true)
                .unwrap();
        }
    }

    vm.write_user(&first, user_page(0), b"first 0").unwrap();
    vm.write_user(&first, user_page(1), b"first 1").unwrap();
    vm.write_user(&second, user_page(0), b"second0").unwrap();
    vm.write_user(&second, user_page(1), b"second1").unwrap();
    assert_eq!(first.resident_count(), 0);

    let mut buffer = [0u8; 7];
    vm.read_user(&first, user_page(1), &mut buffer).unwrap();
    assert_eq!(&buffer, b"first 1");
    vm.read_user(&second, user_page(0), &mut buffer).unwrap();
    assert_eq!(&buffer, b"second0");

    vm.destroy_address_space(first);
    vm.destroy_address_space(second);
    assert_eq!(vm.stats().swap_slots_used, 0);
}

#[test]
fn test_round_robin_policy() {
    use crate::{
        modules::{
            eviction::DefaultEvictionModule,
            page_table::SoftPageTableModule,
            persistent_storage::test::get_test_storage,
            physical_memory::BoundedPhysicalMemoryModule,
        },
        Vm, VmConfig,
    };

    let vm: Vm<BoundedPhysicalMemoryModule, DefaultEvictionModule, _, SoftPageTableModule> =
        Vm::new(
            BoundedPhysicalMemoryModule::new(2),
            get_test_storage("test_round_robin_policy", 4 * PAGE_SIZE),
            VmConfig::default(),
        );

    let space = vm.create_address_space();
    for i in 0..3 {
        vm.create_anonymous_page(&space, user_page(i), true)
            .unwrap();
    }

    vm.write_user(&space, user_page(0), b"zero").unwrap();
    vm.write_user(&space, user_page(1), b"one").unwrap();

    // accessed bits are ignored, the first frame is taken anyway
    vm.write_user(&space, user_page(2), b"two").unwrap();
    assert!(!space.is_resident(user_page(0)));
    assert!(space.is_resident(user_page(1)));

    let mut buffer = [0u8; 4];
    vm.read_user(&space, user_page(0), &mut buffer).unwrap();
    assert_eq!(&buffer, b"zero");
    assert!(!space.is_resident(user_page(1)));

    vm.destroy_address_space(space);
}
