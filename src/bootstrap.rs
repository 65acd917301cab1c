//! The initcall pipeline (§4.1): the ordered sequence that turns a
//! freshly entered kernel into one with interrupts, memory management,
//! a scheduler, and an idle thread running.
//!
//! `early_entry` itself drives the `bootstrap` and `early` stages by
//! hand — they bring up just enough (logging, the GDT/IDT, the real
//! page tables, the heap) that nothing after them has to care whether
//! `alloc::` or a `log::` call works yet, which makes a uniform
//! zero-argument [`InitCall`] table the wrong shape for them. `normal`
//! and `late`, where every step really is "call this, check the
//! result", run through [`initcall::run_stage`] instead.

use crate::arch::x86::multiboot;
use crate::error::KResult;
use crate::initcall::{self, InitCall, Stage};

fn initcall_process() -> KResult<()> {
    crate::process::init();
    Ok(())
}

fn initcall_scheduler() -> KResult<()> {
    crate::sched::init();
    crate::sched::install_timer_handler();
    Ok(())
}

fn initcall_syscall() -> KResult<()> {
    crate::syscall::init();
    Ok(())
}

fn initcall_timer() -> KResult<()> {
    crate::arch::x86::pit::set_frequency(crate::config::TIMER_HZ)?;
    crate::arch::x86::pic::unmask(0);
    Ok(())
}

fn initcall_idle_thread() -> KResult<()> {
    crate::sched::spawn_idle_thread();
    Ok(())
}

/// `normal` and `late` stage initcalls, in the order each stage runs
/// them. `bootstrap`/`early` are driven directly by `early_entry`
/// instead — see the module doc comment.
static INITCALLS: &[InitCall] = &[
    InitCall { name: "process", stage: Stage::Normal, func: initcall_process },
    InitCall { name: "scheduler", stage: Stage::Normal, func: initcall_scheduler },
    InitCall { name: "syscall_dispatcher", stage: Stage::Normal, func: initcall_syscall },
    InitCall { name: "timer_unmask", stage: Stage::Normal, func: initcall_timer },
    InitCall { name: "idle_thread", stage: Stage::Late, func: initcall_idle_thread },
];

/// Runs every stage of the initcall pipeline, then hands off to
/// `after_boot` instead of idling directly. [`early_entry`] is this
/// function with `after_boot` fixed to the idle loop; the integration
/// test binaries under `tests/` use the same sequence with `after_boot`
/// set to their own `test_main`, so a test suite runs against exactly
/// the hardware state the real kernel boots into rather than a
/// hand-rolled subset of it.
///
/// `magic` and `mb_info_phys` are exactly `eax`/`ebx` as the bootloader
/// left them at `_start`, forwarded unchanged from the entry
/// trampoline's indirect call.
pub fn bootstrap_then(magic: u32, mb_info_phys: u32, after_boot: fn() -> !) -> ! {
    crate::logger::init();
    crate::arch::x86::gdt::init();
    crate::arch::x86::serial::init();

    if magic != multiboot::BOOT_MAGIC {
        panic!("not multiboot-compliant: magic={:#x}", magic);
    }

    log::info!("ferrox-kernel: bootstrap stage");

    // SAFETY: `mb_info_phys` is the physical address the bootloader
    // passed in `ebx`, still directly reachable through the provisional
    // mapping the entry trampoline installed (GRUB places this
    // structure, and the memory map it points to, well below the 4 MiB
    // that mapping covers).
    let regions = unsafe { multiboot::memory_regions(mb_info_phys as *const _) };
    crate::mm::pmm::init(regions, crate::config::KERNEL_LMA, crate::mm::kernel_end_phys());

    // SAFETY: still running under the provisional mapping the entry
    // trampoline built, which covers both the code executing this call
    // and the low frames `bootstrap_paging` allocates for the real
    // directory.
    unsafe {
        crate::mm::bootstrap_paging();
    }

    crate::mm::heap::init();
    crate::mm::vas::init_kernel_address_space();

    crate::irq::init();

    initcall::run_stage(INITCALLS, Stage::Bootstrap);
    initcall::run_stage(INITCALLS, Stage::Early);

    log::info!("ferrox-kernel: normal stage");
    initcall::run_stage(INITCALLS, Stage::Normal);

    crate::arch::x86::port::enable_interrupts();

    log::info!("ferrox-kernel: late stage");
    initcall::run_stage(INITCALLS, Stage::Late);

    log::info!("ferrox-kernel: boot complete");

    after_boot()
}

fn idle_forever() -> ! {
    // The flow that has been running since `_start` becomes just another
    // schedulable thread the moment `sched::init` adopts it (inside the
    // `scheduler` initcall above); from here it has nothing left to do
    // but idle alongside the thread `idle_thread` spawned.
    loop {
        crate::arch::x86::port::halt();
    }
}

/// Entered once, from the entry trampoline's hand-written assembly,
/// with paging already enabled against the provisional mapping it
/// built. Never returns.
#[no_mangle]
pub extern "C" fn early_entry(magic: u32, mb_info_phys: u32) -> ! {
    bootstrap_then(magic, mb_info_phys, idle_forever)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn bogus_magic_never_matches_the_multiboot_sentinel() {
        assert_ne!(0xdead_beefu32, multiboot::BOOT_MAGIC);
    }
}
