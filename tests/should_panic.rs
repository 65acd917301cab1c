//! Verifies the panic path itself (§4.1/§7 "unrecoverable errors trip
//! `panic`"): this binary's only test is expected to panic, so its
//! panic handler reports success and ordinary completion reports
//! failure — the inverse of every other integration test here.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(test_runner)]
#![reexport_test_harness_main = "test_main"]

extern crate ferrox_kernel;

use core::panic::PanicInfo;

use ferrox_kernel::{exit_qemu, serial_print, serial_println, QemuExitCode};

ferrox_kernel::define_entry!(16 * 1024, entry);

extern "C" fn entry(magic: u32, mb_info_phys: u32) -> ! {
    ferrox_kernel::bootstrap::bootstrap_then(magic, mb_info_phys, run_tests)
}

fn run_tests() -> ! {
    test_main();
    // A `should_panic` test that returns instead of panicking is itself
    // a failure: the invariant it exists to check did not fire.
    serial_println!("test did not panic");
    exit_qemu(QemuExitCode::Failed);
}

/// Single-test runner: this binary carries exactly one `#[test_case]`,
/// which is expected never to return.
fn test_runner(tests: &[&dyn Fn()]) {
    serial_println!("running {} tests", tests.len());
    for test in tests {
        test();
    }
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    serial_println!("[ok]");
    exit_qemu(QemuExitCode::Success);
}

#[test_case]
fn allocating_past_the_address_space_panics() {
    serial_print!("allocating_past_the_address_space_panics...\t");
    // Requesting a segment far larger than the kernel's virtual address
    // space leaves `segment_alloc` no free interval to return, and the
    // kernel address space has nowhere to route that but a panic: there
    // is no caller-facing error path for "the kernel itself is out of
    // virtual address space" the way there is for a user syscall.
    ferrox_kernel::mm::vas::with_kernel_space(|space| {
        space
            .segment_alloc(
                0xFFFF_0000,
                ferrox_kernel::mm::segment::SegmentFlags::READ | ferrox_kernel::mm::segment::SegmentFlags::WRITE,
            )
            .expect("exhausting kernel virtual address space");
    });
}
