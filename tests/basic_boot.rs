//! Smoke test: the kernel boots all the way through the initcall
//! pipeline (bootstrap/early/normal/late) and reaches a point where the
//! test harness itself can run.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(ferrox_kernel::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

extern crate ferrox_kernel;

ferrox_kernel::define_entry!(16 * 1024, entry);

extern "C" fn entry(magic: u32, mb_info_phys: u32) -> ! {
    ferrox_kernel::bootstrap::bootstrap_then(magic, mb_info_phys, run_tests)
}

fn run_tests() -> ! {
    test_main();
    loop {
        ferrox_kernel::arch::x86::port::halt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    ferrox_kernel::test_panic_handler(info)
}

#[test_case]
fn kernel_reaches_boot_complete() {
    assert!(ferrox_kernel::process::current_process_id().is_some());
}

#[test_case]
fn kernel_heap_allocates() {
    extern crate alloc;
    let v = alloc::vec![1u8, 2, 3];
    assert_eq!(v.len(), 3);
}

#[test_case]
fn idle_thread_joined_the_kernel_process() {
    // The boot flow adopted by `sched::init` and the idle thread spawned
    // by the `late` stage are both threads of the kernel process.
    let count = ferrox_kernel::process::with_process(ferrox_kernel::process::KERNEL_PROCESS, |p| p.threads.len());
    assert_eq!(count, Some(2));
}
