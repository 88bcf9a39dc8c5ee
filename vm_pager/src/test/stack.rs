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

use super::get_test_vm;
use crate::{PageFault, PageType, VirtAddr, VmError, PAGE_SIZE};

#[test]
fn test_setup_stack() {
    let vm = get_test_vm("test_setup_stack", 4, 4);
    let space = vm.create_address_space();
    let top = vm.config().user_stack_top;

    assert_eq!(vm.setup_stack(&space), Ok(top));
    assert_eq!(space.stack_pointer(), top);

    let first = VirtAddr::new(top - PAGE_SIZE);
    assert!(space.is_resident(first));
    assert_eq!(space.page_type(first), Some(PageType::Stack));
    assert_eq!(
        vm.setup_stack(&space),
        Err(VmError::DuplicateMapping(first))
    );

    // the initial page is zero filled and usable right away
    let mut buffer = [0xFFu8; 16];
    vm.read_user(&space, VirtAddr::new(top - 16), &mut buffer)
        .unwrap();
    assert_eq!(buffer, [0u8; 16]);

    vm.destroy_address_space(space);
}

#[test]
fn test_stack_grows_on_push() {
    let vm = get_test_vm("test_stack_grows_on_push", 4, 4);
    let space = vm.create_address_space();
    let top = vm.setup_stack(&space).unwrap();

    let rsp = top - PAGE_SIZE;
    space.set_stack_pointer(rsp);

    // push of 8 bytes right below the stack pointer
    vm.write_user(&space, VirtAddr::new(rsp - 8), &42u64.to_le_bytes())
        .unwrap();
    assert_eq!(space.page_count(), 2);
    assert_eq!(
        space.page_type(VirtAddr::new(rsp - 8)),
        Some(PageType::Stack)
    );

    let mut buffer = [0u8; 8];
    vm.read_user(&space, VirtAddr::new(rsp - 8), &mut buffer)
        .unwrap();
    assert_eq!(u64::from_le_bytes(buffer), 42);

    vm.destroy_address_space(space);
}

#[test]
fn test_stack_access_far_below_rsp_is_rejected() {
    let vm = get_test_vm("test_stack_access_far_below_rsp_is_rejected", 4, 4);
    let space = vm.create_address_space();
    let top = vm.setup_stack(&space).unwrap();

    let rsp = top - 64;
    space.set_stack_pointer(rsp);

    let addr = VirtAddr::new(top - 4 * PAGE_SIZE);
    assert_eq!(
        vm.write_user(&space, addr, b"x"),
        Err(VmError::InvalidAddress(addr))
    );

    // reads below the stack pointer never grow the stack
    let addr = VirtAddr::new(top - PAGE_SIZE - 8);
    space.set_stack_pointer(addr.as_usize());
    let mut buffer = [0u8; 1];
    assert_eq!(
        vm.read_user(&space, addr, &mut buffer),
        Err(VmError::InvalidAddress(addr))
    );
    assert_eq!(space.page_count(), 1);

    vm.destroy_address_space(space);
}

#[test]
fn test_stack_floor() {
    let vm = get_test_vm("test_stack_floor", 16, 256);
    let space = vm.create_address_space();
    let floor = vm.config().stack_floor();

    let below = VirtAddr::new(floor - 1);
    let fault = PageFault::user_write(below, below.as_usize());
    assert_eq!(
        vm.handle_page_fault(&space, fault),
        Err(VmError::InvalidAddress(below))
    );
    assert_eq!(space.page_count(), 0);

    // the lowest allowed page, everything up to the stack top is created
    let fault = PageFault::user_write(VirtAddr::new(floor), floor);
    vm.handle_page_fault(&space, fault).unwrap();
    assert_eq!(
        space.page_count(),
        vm.config().max_stack_size / PAGE_SIZE
    );
    assert!(space.is_resident(VirtAddr::new(floor)));
    assert_eq!(vm.stats().frames_used, 16);

    vm.destroy_address_space(space);
    let stats = vm.stats();
    assert_eq!(stats.frames_used, 0);
    assert_eq!(stats.swap_slots_used, 0);
}

#[test]
fn test_kernel_fault_uses_saved_stack_pointer() {
    let vm = get_test_vm("test_kernel_fault_uses_saved_stack_pointer", 4, 4);
    let space = vm.create_address_space();
    let top = vm.setup_stack(&space).unwrap();

    let rsp = top - PAGE_SIZE;
    space.set_stack_pointer(rsp);

    // a syscall writes into the user stack, the hardware rsp is a kernel address
    let fault = PageFault {
        addr: VirtAddr::new(rsp - 4),
        is_user: false,
        is_write: true,
        not_present: true,
        rsp: vm.config().kernel_base + 0x1000,
    };
    vm.handle_page_fault(&space, fault).unwrap();
    assert!(space.is_resident(VirtAddr::new(rsp - 4)));

    vm.destroy_address_space(space);
}

#[test]
fn test_failed_stack_growth_is_rolled_back() {
    let vm = get_test_vm("test_failed_stack_growth_is_rolled_back", 1, 0);
    let space = vm.create_address_space();
    let top = vm.config().user_stack_top;

    // two new pages are needed but only one frame exists and there is no swap
    let addr = VirtAddr::new(top - 2 * PAGE_SIZE);
    let fault = PageFault::user_write(addr, addr.as_usize());
    assert_eq!(
        vm.handle_page_fault(&space, fault),
        Err(VmError::OutOfMemory)
    );

    assert_eq!(space.page_count(), 0);
    assert_eq!(vm.stats().frames_used, 0);

    vm.destroy_address_space(space);
}
