//! Architecture-independent interrupt dispatcher.
//!
//! The IDT (`arch::x86::idt`) is the only code that knows about gate
//! descriptors and `lidt`; everything from here up only knows about
//! vector numbers, [`Registers`], and a `(vector -> (fn, data))` table.
//! Exactly one dispatcher — [`dispatch`] — is the entry point for every
//! asynchronous event, matching the "interrupt control-flow" design note:
//! preemption decisions are made on return from `dispatch`, never inside
//! a registered handler.

use spin::Mutex;

use crate::arch::x86::{idt, pic};

pub const PIC_VECTOR_BASE: u8 = 0x20;
pub const PIC_VECTOR_END: u8 = 0x2f;
pub const TIMER_VECTOR: u8 = PIC_VECTOR_BASE; // IRQ0
pub const SYSCALL_VECTOR: u8 = 0x80;
pub const PAGE_FAULT_VECTOR: u8 = 14;
pub const GENERAL_PROTECTION_VECTOR: u8 = 13;

/// Registers visible to a registered handler. Fields are private:
/// handlers that need to affect the return path go through
/// [`Registers::set_stack_pointer`] or [`Registers::set_return_value`],
/// never by poking the raw frame, so the return path's invariants always
/// hold.
#[derive(Debug, Clone, Copy)]
pub struct Registers {
    pub(crate) eax: u32,
    pub(crate) ebx: u32,
    pub(crate) ecx: u32,
    pub(crate) edx: u32,
    pub(crate) esi: u32,
    pub(crate) edi: u32,
    pub(crate) ebp: u32,
    pub(crate) eip: u32,
    pub(crate) esp: u32,
    pub(crate) eflags: u32,
    pub(crate) cs: u32,
    pub(crate) from_userspace: bool,
}

impl Registers {
    pub fn eax(&self) -> u32 {
        self.eax
    }
    pub fn ebx(&self) -> u32 {
        self.ebx
    }
    pub fn ecx(&self) -> u32 {
        self.ecx
    }
    pub fn edx(&self) -> u32 {
        self.edx
    }
    pub fn esi(&self) -> u32 {
        self.esi
    }
    pub fn edi(&self) -> u32 {
        self.edi
    }
    pub fn ebp(&self) -> u32 {
        self.ebp
    }
    pub fn eip(&self) -> u32 {
        self.eip
    }
    pub fn stack_pointer(&self) -> u32 {
        self.esp
    }
    pub fn from_userspace(&self) -> bool {
        self.from_userspace
    }

    /// Updates the stack pointer that will be restored on `iretd`. Used
    /// by `execve` and the initial-frame synthesis in the scheduler;
    /// never called from an ordinary handler.
    pub fn set_stack_pointer(&mut self, sp: u32) {
        self.esp = sp;
    }

    /// Writes the syscall return value / exception recovery value into
    /// the register the ABI returns values in (`eax`).
    pub fn set_return_value(&mut self, value: i32) {
        self.eax = value as u32;
    }

    /// Redirects the interrupted context's next instruction on return.
    /// Used only by `execve`, to repoint a thread's existing ring-3
    /// frame at a freshly loaded entry point instead of the instruction
    /// after the `int 0x80` that invoked it.
    pub fn set_instruction_pointer(&mut self, eip: u32) {
        self.eip = eip;
    }
}

pub type HandlerFn = fn(vector: u8, error_code: u32, regs: &mut Registers, data: *mut u8);

#[derive(Clone, Copy)]
struct Handler {
    func: HandlerFn,
    data: *mut u8,
}

// SAFETY: handler `data` pointers are either null or point at
// `'static` subsystem state set up once at registration time; the table
// itself is only ever mutated under `HANDLERS`'s spinlock.
unsafe impl Send for Handler {}

static HANDLERS: Mutex<[Option<Handler>; 256]> = Mutex::new([None; 256]);

/// Registers a handler for `vector`. When `data` is null, `dispatch`
/// passes a pointer to the [`Registers`] snapshot instead, so a handler
/// that only needs the frame doesn't need its own state pointer.
pub fn set_handler(vector: u8, func: HandlerFn, data: *mut u8) {
    HANDLERS.lock()[vector as usize] = Some(Handler { func, data });
}

pub fn clear_handler(vector: u8) {
    HANDLERS.lock()[vector as usize] = None;
}

/// The single entry point every interrupt and exception passes through.
///
/// 1. locates the registered handler (or logs and returns for unknown
///    vectors),
/// 2. updates the calling thread's saved stack pointer from the frame,
/// 3. calls the handler,
/// 4. issues EOI for hardware IRQs,
/// 5. asks the scheduler whether a reschedule is pending.
pub fn dispatch(vector: u8, error_code: u32, regs: &mut Registers) {
    crate::sched::current_thread_save_sp(regs.stack_pointer());

    match vector {
        PAGE_FAULT_VECTOR => {
            crate::mm::page_fault::handle(crate::arch::x86::port::read_cr2() as u32, error_code, regs);
        }
        GENERAL_PROTECTION_VECTOR => {
            panic!(
                "general protection fault: error_code={:#x} eip={:#x}",
                error_code,
                regs.eip()
            );
        }
        v if v < 32 && !is_recoverable_exception(v) => {
            panic!(
                "unrecoverable exception {}: error_code={:#x} eip={:#x}",
                v,
                error_code,
                regs.eip()
            );
        }
        _ => {
            let handler = HANDLERS.lock()[vector as usize];
            match handler {
                Some(h) => {
                    let data = if h.data.is_null() {
                        regs as *mut Registers as *mut u8
                    } else {
                        h.data
                    };
                    (h.func)(vector, error_code, regs, data);
                }
                None => log::warn!("no handler registered for interrupt vector {}", vector),
            }
        }
    }

    if (PIC_VECTOR_BASE..=PIC_VECTOR_END).contains(&vector) {
        pic::send_eoi(vector - PIC_VECTOR_BASE);
    }

    if vector == TIMER_VECTOR || vector == SYSCALL_VECTOR {
        if crate::sched::preemption_pending() && (regs.from_userspace() || interrupts_were_enabled(regs)) {
            crate::sched::schedule();
        }
    }

    let restored_sp = crate::sched::current_thread_sp();
    regs.set_stack_pointer(restored_sp);
}

fn is_recoverable_exception(vector: u8) -> bool {
    matches!(vector, 0 | 1 | 3 | 4 | 5 | 6 | 7)
}

fn interrupts_were_enabled(regs: &Registers) -> bool {
    regs.eflags & (1 << 9) != 0
}

/// Installs the IDT and legacy PIC/PIT programming. Part of the
/// `bootstrap` initcall stage.
pub fn init() {
    idt::init();
    pic::init();
}
