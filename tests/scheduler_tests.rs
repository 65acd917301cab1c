//! Preemptive round-robin scheduler (§4.7) integration tests: thread
//! spawn, cooperative yield, and the blocking primitives built on top
//! of it.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(ferrox_kernel::test_runner)]
#![reexport_test_harness_main = "test_main"]

extern crate alloc;
extern crate ferrox_kernel;

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicU32, Ordering};

use ferrox_kernel::process;
use ferrox_kernel::sched;
use ferrox_kernel::sync::semaphore::Semaphore;

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

static COUNTER: AtomicU32 = AtomicU32::new(0);

extern "C" fn counting_worker(increments: usize) -> ! {
    for _ in 0..increments {
        COUNTER.fetch_add(1, Ordering::SeqCst);
        sched::yield_now();
    }
    sched::terminate_current();
}

#[test_case]
fn spawned_thread_runs_and_terminates() {
    COUNTER.store(0, Ordering::SeqCst);
    process::spawn_kernel_thread(counting_worker, 5);
    for _ in 0..20 {
        sched::yield_now();
        if COUNTER.load(Ordering::SeqCst) >= 5 {
            break;
        }
    }
    assert_eq!(COUNTER.load(Ordering::SeqCst), 5);
}

static READY: Semaphore = Semaphore::new(0);
static DONE: AtomicU32 = AtomicU32::new(0);

extern "C" fn waiter(_arg: usize) -> ! {
    READY.acquire();
    DONE.store(1, Ordering::SeqCst);
    sched::terminate_current();
}

#[test_case]
fn semaphore_blocks_until_released() {
    DONE.store(0, Ordering::SeqCst);

    process::spawn_kernel_thread(waiter, 0);
    for _ in 0..10 {
        sched::yield_now();
    }
    assert_eq!(DONE.load(Ordering::SeqCst), 0);
    assert!(READY.has_waiters());

    READY.release();
    for _ in 0..10 {
        sched::yield_now();
        if DONE.load(Ordering::SeqCst) == 1 {
            break;
        }
    }
    assert_eq!(DONE.load(Ordering::SeqCst), 1);
}
