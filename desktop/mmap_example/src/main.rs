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

use env_logger::{Builder, Env};
use log::info;
use rand::{rngs::SmallRng, RngCore, SeedableRng};
use vm_pager::{
    modules::{
        file_system::{FileSystemModule, MemoryFileSystemModule},
        persistent_storage::FilePersistentStorageModule,
        physical_memory::BoundedPhysicalMemoryModule,
    },
    DefaultVm, VirtAddr, Vm, VmConfig, PAGE_SIZE,
};

const FRAMES: usize = 4;
const SWAP_PAGES: usize = 64;
const HEAP_BASE: usize = 0x40_0000;
const MAPPING_BASE: usize = 0x1000_0000;

fn main() {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Info)
        .format_module_path(false)
        .init();

    let storage = FilePersistentStorageModule::new(
        "/tmp/vm_pager_mmap_example.swap".to_string(),
        SWAP_PAGES * PAGE_SIZE,
    )
    .unwrap();

    let vm: DefaultVm<FilePersistentStorageModule> = Vm::new(
        BoundedPhysicalMemoryModule::new(FRAMES),
        storage,
        VmConfig::default(),
    );

    let fs = MemoryFileSystemModule::new();
    fs.create_with("hello.txt", b"HELLO");

    let space = vm.create_address_space();
    let rsp = vm.setup_stack(&space).unwrap();
    info!("stack set up, rsp = {:#x}", rsp);

    // map the file, change one byte and unmap it again
    {
        let file = fs.open("hello.txt").unwrap();
        let addr = VirtAddr::new(MAPPING_BASE);
        vm.map_file(&space, addr, 5, true, &file, 0).unwrap();

        let mut buffer = [0u8; 5];
        vm.read_user(&space, addr, &mut buffer).unwrap();
        println!("mapped content: {}", String::from_utf8_lossy(&buffer));

        vm.write_user(&space, addr, b"X").unwrap();
        let report = vm.unmap_file(&space, addr);
        println!(
            "unmapped {} pages, {} written back",
            report.pages_removed, report.pages_written
        );
    }
    println!(
        "file content: {}",
        String::from_utf8_lossy(&fs.content("hello.txt").unwrap())
    );

    // use more memory than there is
    let mut rand = SmallRng::seed_from_u64(0x5eed);
    let pages = 4 * FRAMES;
    let mut contents = Vec::new();
    for i in 0..pages {
        let va = VirtAddr::new(HEAP_BASE + i * PAGE_SIZE);
        vm.create_anonymous_page(&space, va, true).unwrap();

        let mut data = vec![0u8; PAGE_SIZE];
        rand.fill_bytes(&mut data);
        vm.write_user(&space, va, &data).unwrap();
        contents.push(data);
    }

    let mut buffer = vec![0u8; PAGE_SIZE];
    for (i, data) in contents.iter().enumerate() {
        let va = VirtAddr::new(HEAP_BASE + i * PAGE_SIZE);
        vm.read_user(&space, va, &mut buffer).unwrap();
        assert_eq!(&buffer, data);
    }

    let stats = vm.stats();
    println!(
        "{} pages in {} frames: {} evictions, {} swap slots in use",
        pages, stats.frames_total, stats.evictions, stats.swap_slots_used
    );

    // fork and let the child diverge
    let child = vm.clone_address_space(&space).unwrap();
    let first = VirtAddr::new(HEAP_BASE);
    vm.write_user(&child, first, b"child").unwrap();

    let mut parent_view = [0u8; 5];
    vm.read_user(&space, first, &mut parent_view).unwrap();
    assert_eq!(&parent_view, &contents[0][..5]);
    println!("child diverged from parent after fork");

    vm.destroy_address_space(child);
    let report = vm.destroy_address_space(space);
    println!("address space destroyed, {} pages removed", report.pages_removed);
}
