//! The boot trampoline every linked binary needs exactly one of: the
//! handful of instructions that run identity-mapped at the kernel's
//! physical load address, before paging exists, and that get a higher-half
//! Rust entry point reachable.
//!
//! A higher-half kernel can't just `call` straight into a `KERNEL_VMA`
//! Rust symbol from here: a direct `call` is encoded PC-relative, so
//! taken this early (paging still off, this code still running at its
//! low physical load address) it would compute a target nowhere near
//! where the callee's bytes actually are. [`define_entry`] builds the
//! smallest mapping that can possibly work instead — one 4 MiB page,
//! identity at 0 and mirrored at `KERNEL_VMA`, covering the whole kernel
//! image and a small boot stack — turns paging on, and only then jumps
//! into the given entry point through a register holding its absolute
//! (high) address, which by that point the MMU resolves correctly. The
//! entry point is expected to replace this provisional mapping with the
//! real one ([`crate::mm::bootstrap_paging`]) before anything else
//! touches memory.
//!
//! Every binary that links this crate supplies its own `_start` this
//! way: the real kernel binary (`main.rs`) and every `tests/*.rs`
//! integration test, each a standalone multiboot image GRUB loads and
//! jumps into independently. Defined as a macro rather than a function
//! in this crate because the `_start` symbol, the provisional page
//! directory, and the boot stack must each exist exactly once per
//! linked binary, not once per crate.

/// Emits a `_start` entry point and its supporting boot-time statics,
/// jumping into `$entry` (an `extern "C" fn(magic: u32, mb_info_phys: u32) -> !`)
/// once paging is live. `$stack_size` is the size in bytes of the stack
/// `_start` sets up before paging is enabled.
#[macro_export]
macro_rules! define_entry {
    ($stack_size:expr, $entry:path) => {
        const _BOOT_STACK_SIZE: usize = $stack_size;

        #[repr(align(16))]
        struct _BootStack([u8; _BOOT_STACK_SIZE]);

        #[no_mangle]
        #[link_section = ".boot.bss"]
        static mut _BOOT_STACK: _BootStack = _BootStack([0; _BOOT_STACK_SIZE]);

        core::arch::global_asm!(
            r#"
.section .boot.bss, "aw", @nobits
.align 4096
.global boot_page_directory
boot_page_directory:
    .skip 4096

.section .boot.text, "ax"
.global _start
_start:
    cli
    mov esp, offset _BOOT_STACK + {stack_size}
    mov edi, ebx
    mov esi, eax

    mov eax, 0x83
    mov [boot_page_directory], eax
    mov [boot_page_directory + {kernel_pd_start} * 4], eax

    mov eax, cr4
    or eax, 0x10
    mov cr4, eax

    mov eax, offset boot_page_directory
    mov cr3, eax

    mov eax, cr0
    or eax, 0x80010000
    mov cr0, eax

    mov eax, offset {entry}
    push edi
    push esi
    call eax
2:
    hlt
    jmp 2b
"#,
            stack_size = const _BOOT_STACK_SIZE,
            kernel_pd_start = const $crate::arch::x86::mmu::KERNEL_PD_START,
            entry = sym $entry,
        );
    };
}
