//! Context switch: the only place a thread's machine state changes
//! without going through the interrupt-return path.
//!
//! A thread's saved state is nothing but a stack pointer; everything
//! else lives on the stack that pointer addresses, in the shape
//! [`switch_to`]'s assembly pushes and pops it in. A freshly created
//! thread never goes through `switch_to` to get there, so
//! [`new_kernel_thread_stack`]/[`new_user_thread_stack`] build the same
//! shape by hand — the "synthesised initial interrupt frame" §4.7 calls
//! for.

use core::arch::{global_asm, naked_asm};

use super::gdt::{USER_CODE_SELECTOR, USER_DATA_SELECTOR};

extern "C" {
    fn switch_to_asm(save_sp: *mut u32, restore_sp: u32);
}

global_asm!(
    r#"
.section .text
.global switch_to_asm
switch_to_asm:
    push ebp
    push ebx
    push esi
    push edi
    pushfd

    mov eax, [esp + 24]
    mov [eax], esp

    mov esp, [esp + 28]

    popfd
    pop edi
    pop esi
    pop ebx
    pop ebp
    ret
"#,
);

/// Saves the caller's non-volatile registers onto its own stack, records
/// the resulting stack pointer at `*save_sp`, and switches to
/// `restore_sp`, popping whatever `switch_to`/a synthesised stack left
/// there. Returns when some later call switches back to `save_sp`.
///
/// # Safety
/// `restore_sp` must point into a stack previously left by `switch_to`
/// or built by [`new_kernel_thread_stack`]/[`new_user_thread_stack`].
pub unsafe fn switch_to(save_sp: *mut u32, restore_sp: u32) {
    // SAFETY: delegated to the caller's contract above.
    unsafe { switch_to_asm(save_sp, restore_sp) }
}

/// Builds the initial stack for a new kernel thread so that the first
/// [`switch_to`] into it "returns" straight into `entry`.
///
/// Returns the stack pointer to store as the thread's saved `sp`.
pub fn new_kernel_thread_stack(stack_top: u32, entry: extern "C" fn(usize) -> !, arg: usize) -> u32 {
    // SAFETY: `stack_top` is the caller-owned top of a freshly allocated
    // kernel stack; every write below stays within it as long as the
    // stack is at least a few dozen bytes, which `config::KERNEL_STACK_SIZE`
    // guarantees.
    unsafe {
        let mut sp = stack_top as *mut u32;
        sp = sp.sub(1);
        *sp = arg as u32;
        sp = sp.sub(1);
        *sp = kernel_thread_trampoline as u32; // return address for the entry call
        sp = sp.sub(1);
        *sp = entry as u32;

        // The five words switch_to_asm's epilogue pops, in pop order:
        // eflags, edi, esi, ebx, ebp. Pop order is lowest-address-first,
        // so the word at the returned sp (the lowest address of the
        // block) must be eflags, with ebp written first at the top.
        sp = sp.sub(1);
        *sp = 0; // ebp
        sp = sp.sub(1);
        *sp = 0; // ebx
        sp = sp.sub(1);
        *sp = 0; // esi
        sp = sp.sub(1);
        *sp = 0; // edi
        sp = sp.sub(1);
        *sp = 0x202; // eflags: interrupts enabled
        sp as u32
    }
}

#[naked]
extern "C" fn kernel_thread_trampoline() -> ! {
    // SAFETY: invoked only as the synthesised return address from
    // `new_kernel_thread_stack`, with `entry` and `arg` sitting exactly
    // where this pops them from.
    unsafe {
        naked_asm!(
            "pop eax",   // entry fn
            "pop ecx",   // discard trampoline's own synthesised return slot
            "pop edi",   // arg
            "push edi",
            "call eax",
            "ud2",
        )
    }
}

/// Builds the initial stack for a process's first thread so the first
/// `switch_to` into it falls through an `iretd` into ring 3 at
/// `entry_eip` with stack `user_esp`.
pub fn new_user_thread_stack(stack_top: u32, entry_eip: u32, user_esp: u32) -> u32 {
    // SAFETY: see `new_kernel_thread_stack`; this lays out one more
    // level of indirection (an `iretd` frame) below the same
    // switch_to_asm prologue shape.
    unsafe {
        let mut sp = stack_top as *mut u32;
        sp = sp.sub(1);
        *sp = USER_DATA_SELECTOR as u32; // ss
        sp = sp.sub(1);
        *sp = user_esp; // esp
        sp = sp.sub(1);
        *sp = 0x202; // eflags
        sp = sp.sub(1);
        *sp = USER_CODE_SELECTOR as u32; // cs
        sp = sp.sub(1);
        *sp = entry_eip; // eip

        sp = sp.sub(1);
        *sp = enter_usermode_trampoline as u32;

        // Same switch_to_asm prologue shape as `new_kernel_thread_stack`:
        // ebp written first (top of the block), eflags last so it lands
        // at the returned sp, where `popfd` expects it.
        sp = sp.sub(1);
        *sp = 0; // ebp
        sp = sp.sub(1);
        *sp = 0; // ebx
        sp = sp.sub(1);
        *sp = 0; // esi
        sp = sp.sub(1);
        *sp = 0; // edi
        sp = sp.sub(1);
        *sp = 0x202; // eflags
        sp as u32
    }
}

#[naked]
extern "C" fn enter_usermode_trampoline() -> ! {
    // SAFETY: the caller (`switch_to_asm`'s `ret`) leaves exactly the
    // iretd frame `new_user_thread_stack` built directly on top of the
    // stack pointer; `iretd` consumes it and drops to ring 3.
    unsafe {
        naked_asm!(
            "mov ax, {user_data}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "xor eax, eax", // fork's child (and a fresh exec) always sees a zeroed return value
            "iretd",
            user_data = const USER_DATA_SELECTOR,
        )
    }
}
