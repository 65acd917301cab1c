//! Legacy 8259 Programmable Interrupt Controller.
//!
//! Master at 0x20/0x21, slave at 0xA0/0xA1, remapped to vectors
//! 0x20..0x2F so hardware IRQs don't collide with CPU exception vectors.

use pic8259::ChainedPics;
use spin::Mutex;

use crate::irq::PIC_VECTOR_BASE;

static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_VECTOR_BASE, PIC_VECTOR_BASE + 8) });

/// Remaps both PICs and masks every line.
///
/// IRQ0 (the scheduler tick) is deliberately left masked here: unmasking
/// it is the `normal` initcall stage's job, once the scheduler is ready
/// to receive preemption ticks (design note (b) — this resolves the
/// legacy `scheduler_initialized` ordering hazard by construction
/// instead of a checked flag).
pub fn init() {
    // SAFETY: called once, before interrupts are enabled, with the
    // offsets above guaranteed not to overlap CPU exception vectors.
    unsafe {
        PICS.lock().initialize();
    }
    set_mask(0xffff);
}

pub fn send_eoi(irq: u8) {
    // SAFETY: `irq` is the hardware line number (0..16) derived from a
    // vector that `irq::dispatch` already confirmed falls in the PIC
    // range.
    unsafe {
        PICS.lock().notify_end_of_interrupt(PIC_VECTOR_BASE + irq);
    }
}

fn set_mask(mask: u16) {
    use crate::arch::x86::port::outb;
    // SAFETY: 0x21/0xA1 are the PIC data ports; writing the mask is the
    // documented way to enable/disable individual IRQ lines.
    unsafe {
        outb(0x21, (mask & 0xff) as u8);
        outb(0xa1, (mask >> 8) as u8);
    }
}

/// Unmasks a single IRQ line (0..16), letting its interrupts reach the
/// CPU. Called by `irq::init` for IRQ0 only after the scheduler is ready
/// to receive preemption ticks (see design note (b)).
pub fn unmask(irq: u8) {
    use crate::arch::x86::port::inb;
    let port = if irq < 8 { 0x21 } else { 0xa1 };
    let bit = if irq < 8 { irq } else { irq - 8 };
    // SAFETY: reads/writes the documented PIC data port, clearing a
    // single mask bit.
    unsafe {
        let current = inb(port);
        outb_mask(port, current & !(1 << bit));
    }
}

fn outb_mask(port: u16, value: u8) {
    use crate::arch::x86::port::outb;
    // SAFETY: `port` is 0x21 or 0xa1, passed in by `unmask` above.
    unsafe { outb(port, value) }
}
