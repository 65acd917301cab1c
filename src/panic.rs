//! The panic path (§7): disables interrupts, walks the kernel stack via
//! saved frame pointers, resolves each return address to the nearest
//! kernel symbol (via the [`crate::symbols`] stub), dumps a few words of
//! the faulting stack, and halts forever. Never returns.

use crate::config::KERNEL_VMA;

/// Frames walked before giving up; a real stack can't chain deeper than
/// this on a 16 KiB kernel stack with any reasonable frame size.
const MAX_FRAMES: usize = 32;

/// Words of the faulting stack dumped alongside the frame trace.
const STACK_DUMP_WORDS: usize = 16;

#[inline(always)]
fn read_ebp() -> u32 {
    let ebp: u32;
    // SAFETY: reads a general-purpose register; no memory access.
    unsafe {
        core::arch::asm!("mov {0}, ebp", out(reg) ebp, options(nomem, preserves_flags));
    }
    ebp
}

/// True if `addr` looks like a plausible frame pointer into the
/// kernel's own stacks rather than garbage left by a corrupted frame.
fn looks_like_kernel_stack_addr(addr: u32) -> bool {
    addr != 0 && addr >= KERNEL_VMA as u32 && addr % 4 == 0
}

fn unwind(starting_ebp: u32) {
    let mut ebp = starting_ebp;
    for depth in 0..MAX_FRAMES {
        if !looks_like_kernel_stack_addr(ebp) {
            break;
        }
        // SAFETY: `ebp` was just checked to be a plausibly mapped,
        // word-aligned kernel address; a frame built by this crate's
        // own prologues always has a saved ebp at [ebp] and a return
        // address at [ebp + 4]. A corrupted chain can still fault here,
        // but there is no handler left to recover into anyway.
        let (saved_ebp, return_addr) = unsafe {
            let frame = ebp as *const u32;
            (frame.read(), frame.add(1).read())
        };
        match crate::symbols::resolve(return_addr) {
            Some(name) => log::error!("  #{depth} {:#010x} ({name})", return_addr),
            None => log::error!("  #{depth} {:#010x}", return_addr),
        }
        if saved_ebp <= ebp {
            break;
        }
        ebp = saved_ebp;
    }
}

fn dump_stack(esp: u32) {
    log::error!("stack @ {:#010x}:", esp);
    for i in 0..STACK_DUMP_WORDS {
        let addr = esp.wrapping_add((i * 4) as u32);
        if !looks_like_kernel_stack_addr(addr) {
            break;
        }
        // SAFETY: `addr` was checked above; reading past a live stack
        // pointer within this small, word-aligned window only risks an
        // unmapped read, which the panic path can't do anything about
        // regardless.
        let word = unsafe { (addr as *const u32).read() };
        log::error!("  [{:#010x}] = {:#010x}", addr, word);
    }
}

/// The kernel's `#[panic_handler]` body, called from `main.rs`'s
/// `#[panic_handler]` function (the harness needs it to live in the
/// final binary, not this crate's `rlib`).
pub fn handle(info: &core::panic::PanicInfo) -> ! {
    crate::arch::x86::port::save_and_disable_interrupts();

    log::error!("kernel panic: {}", info);
    let ebp = read_ebp();
    unwind(ebp);
    dump_stack(ebp);

    loop {
        crate::arch::x86::port::halt();
    }
}
