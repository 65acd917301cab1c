//! IDT construction and the single common interrupt entry point.
//!
//! This is the concrete i686 half of [`crate::irq`]: it owns the 256
//! gate descriptors and the `(vector -> handler)` table, and is the only
//! place that talks to `lidt` and the stub table in
//! [`super::interrupt_stubs`].

use core::mem::size_of;

use spin::Mutex;

use super::interrupt_stubs::{has_hardware_error_code, stub_address, InterruptFrame};
use crate::irq::{dispatch, Registers};

const IDT_ENTRIES: usize = 256;

const GATE_PRESENT: u8 = 1 << 7;
const GATE_RING0: u8 = 0 << 5;
const GATE_RING3: u8 = 3 << 5;
const GATE_INTERRUPT_32: u8 = 0b1110;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, selector: u16, ring: u8) -> Self {
        Self {
            offset_low: (handler & 0xffff) as u16,
            selector,
            zero: 0,
            type_attr: GATE_PRESENT | ring | GATE_INTERRUPT_32,
            offset_high: (handler >> 16) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

struct Idt {
    entries: [IdtEntry; IDT_ENTRIES],
}

static IDT: Mutex<Idt> = Mutex::new(Idt {
    entries: [IdtEntry::missing(); IDT_ENTRIES],
});

/// Builds all 256 gates (all pointing at the per-vector stubs) and loads
/// IDTR. Called once from the `bootstrap` initcall stage, before
/// interrupts are ever enabled.
pub fn init() {
    let mut idt = IDT.lock();
    for vector in 0..IDT_ENTRIES {
        let ring = if vector == 0x80 { GATE_RING3 } else { GATE_RING0 };
        idt.entries[vector] = IdtEntry::new(stub_address(vector as u8), 0x08, ring);
    }

    let pointer = IdtPointer {
        limit: (size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
        base: idt.entries.as_ptr() as u32,
    };

    // SAFETY: `pointer` outlives the `lidt` call and describes the table
    // we just finished initialising.
    unsafe {
        core::arch::asm!("lidt [{0}]", in(reg) &pointer, options(readonly, nostack, preserves_flags));
    }
}

/// The function the assembly tail in `interrupt_stubs.rs` calls for
/// every vector. Normalises the raw stack frame into [`Registers`] and
/// hands it to the architecture-independent dispatcher.
///
/// # Safety
/// Called only from the assembly trampoline, exactly once per interrupt,
/// with `frame` pointing at a validly laid out [`InterruptFrame`] on the
/// current kernel stack.
#[no_mangle]
pub extern "C" fn common_interrupt_handler(frame: *mut InterruptFrame) {
    // SAFETY: see function doc.
    let frame = unsafe { &mut *frame };
    let mut regs = Registers {
        eax: frame.eax,
        ebx: frame.ebx,
        ecx: frame.ecx,
        edx: frame.edx,
        esi: frame.esi,
        edi: frame.edi,
        ebp: frame.ebp,
        eip: frame.eip,
        esp: if frame.from_userspace() {
            frame.useresp
        } else {
            frame.esp_dummy
        },
        eflags: frame.eflags,
        cs: frame.cs,
        from_userspace: frame.from_userspace(),
    };

    dispatch(frame.vector as u8, frame.error_code, &mut regs);

    frame.eax = regs.eax;
    frame.eip = regs.eip;
    if frame.from_userspace() {
        frame.useresp = regs.esp;
    }
}

/// Whether `vector` is a CPU exception that pushes its own error code
/// (re-exported so [`crate::irq`] can validate registration requests
/// without depending on the assembly module directly).
pub fn vector_has_error_code(vector: u8) -> bool {
    has_hardware_error_code(vector)
}
