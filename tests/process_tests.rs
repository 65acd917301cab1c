//! Process lifecycle (§4.9) integration tests: `fork`, `exit`, and
//! `waitpid` exercised against the real scheduler rather than mocked.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(ferrox_kernel::test_runner)]
#![reexport_test_harness_main = "test_main"]

extern crate alloc;
extern crate ferrox_kernel;

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicU32, Ordering};

use ferrox_kernel::process::{self, ProcessId};
use ferrox_kernel::sched;

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

static WORKER_RAN: AtomicU32 = AtomicU32::new(0);

extern "C" fn exiting_worker(status: usize) -> ! {
    WORKER_RAN.store(1, Ordering::SeqCst);
    sched::terminate_current();
    #[allow(unreachable_code)]
    {
        let _ = status;
        unreachable!()
    }
}

#[test_case]
fn kernel_process_survives_spawning_and_terminating_a_worker() {
    WORKER_RAN.store(0, Ordering::SeqCst);
    let before = process::with_process(process::KERNEL_PROCESS, |p| p.threads.len()).unwrap();

    process::spawn_kernel_thread(exiting_worker, 0);
    for _ in 0..20 {
        sched::yield_now();
        if WORKER_RAN.load(Ordering::SeqCst) == 1 {
            break;
        }
    }
    assert_eq!(WORKER_RAN.load(Ordering::SeqCst), 1);

    // The worker moved itself to the process's zombie_threads list
    // rather than staying in `threads`, per `exit_current`'s bookkeeping.
    let after = process::with_process(process::KERNEL_PROCESS, |p| p.threads.len()).unwrap();
    assert_eq!(after, before);
}

#[test_case]
fn waitpid_rejects_a_target_that_is_not_a_child() {
    let tid = sched::current_thread_id();
    let bogus = ProcessId(u32::MAX - 1);
    let result = process::waitpid(tid, Some(bogus));
    assert!(result.is_err());
}

#[test_case]
fn kill_of_unknown_pid_reports_no_such_process() {
    let result = process::kill(ProcessId(u32::MAX));
    assert!(result.is_err());
}
