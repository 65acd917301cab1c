//! Thin shims over the handful of i686 instructions the rest of the
//! kernel needs: port I/O, interrupt enable/disable, halt, and the
//! control-register accessors the MMU driver uses.
//!
//! Everything here is `unsafe` because it is either inline assembly or a
//! direct wrapper around one. Callers above this module never reach for
//! `asm!` directly.

pub use x86::io::{inb, inw, inl, outb, outw, outl};

/// Halts the CPU until the next interrupt. Used by the idle thread.
#[inline]
pub fn halt() {
    unsafe { x86::halt() }
}

/// Disables maskable interrupts, returning whether they were enabled.
/// Paired with [`restore_interrupts`] to implement save/restore critical
/// sections (used by the scheduler lock and spinlock).
#[inline]
pub fn save_and_disable_interrupts() -> bool {
    let flags: u32;
    unsafe {
        core::arch::asm!("pushfd; pop {0}", out(reg) flags, options(nomem, preserves_flags));
    }
    let was_enabled = flags & (1 << 9) != 0;
    unsafe { x86::irq::disable() };
    was_enabled
}

/// Restores the interrupt-enable flag captured by
/// [`save_and_disable_interrupts`].
#[inline]
pub fn restore_interrupts(was_enabled: bool) {
    if was_enabled {
        unsafe { x86::irq::enable() };
    }
}

/// Unconditionally enables maskable interrupts. Used once, by the
/// `normal` initcall stage, once the IDT, PIC, and scheduler are all
/// ready to receive a preemption tick.
#[inline]
pub fn enable_interrupts() {
    unsafe { x86::irq::enable() };
}

#[inline]
pub fn interrupts_enabled() -> bool {
    let flags: u32;
    unsafe {
        core::arch::asm!("pushfd; pop {0}", out(reg) flags, options(nomem, preserves_flags));
    }
    flags & (1 << 9) != 0
}

/// Reads CR2, the faulting address latched by the last page fault.
#[inline]
pub fn read_cr2() -> usize {
    unsafe { x86::controlregs::cr2() as usize }
}

/// Reads CR3, the current page directory's physical base.
#[inline]
pub fn read_cr3() -> usize {
    unsafe { x86::controlregs::cr3() as usize }
}

/// Loads CR3 with a new page directory physical base, flushing the
/// entire TLB.
///
/// # Safety
/// `pdbr` must be the physical address of a valid page directory that
/// identity-maps (or higher-half maps) the code currently executing.
#[inline]
pub unsafe fn write_cr3(pdbr: u32) {
    unsafe { x86::controlregs::cr3_write(pdbr) }
}

/// Sets the paging-enable bit in CR0. Must be called exactly once, after
/// the bootstrap page directory is installed via [`write_cr3`].
///
/// # Safety
/// The currently executing code must already be mapped at its current
/// address by the page directory CR3 points to, or the next instruction
/// fetch faults with no handler installed yet.
#[inline]
pub unsafe fn enable_paging() {
    unsafe {
        let mut flags = x86::controlregs::cr0();
        flags |= x86::controlregs::Cr0::CR0_ENABLE_PAGING;
        flags |= x86::controlregs::Cr0::CR0_WRITE_PROTECT;
        x86::controlregs::cr0_write(flags);
    }
}
