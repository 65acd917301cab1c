//! Compile-time kernel configuration.
//!
//! Nothing here is runtime-tunable: there is no filesystem to read a
//! config file from until well into the `late` initcall stage, and by
//! then these values have already shaped the layout of static structures.

/// Size of a page frame / virtual page, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Higher-half virtual base the kernel image and its permanent mappings
/// live above. Identical in every address space.
pub const KERNEL_VMA: usize = 0xC000_0000;

/// Physical load address of the kernel image (matches `KERNEL_LMA` in
/// `link.ld`): where GRUB actually places the `.boot`/`.text`/... bytes,
/// before the linker's higher-half `AT()` offset is unwound by paging.
pub const KERNEL_LMA: u32 = 0x0010_0000;

/// First byte not usable by a user address space (the kernel's higher
/// half starts here and is mapped into every process).
pub const ADDRESS_SPACE_END: usize = KERNEL_VMA;

/// PIT channel 0 is programmed to fire at this frequency; this is also
/// the scheduler's preemption tick.
pub const TIMER_HZ: u32 = 1000;

/// Default time slice granted to a thread before preemption, in timer
/// ticks. At `TIMER_HZ` = 1000 this is 2 ms.
pub const DEFAULT_QUANTUM_TICKS: u32 = 2;

/// Kernel-heap bucket size classes, smallest to largest. Allocations
/// larger than the last class fall through to the page-granular
/// allocator.
pub const BUCKET_SIZE_CLASSES: &[usize] = &[
    16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384,
];

/// Minimum alignment guaranteed for every `kmalloc` return value.
pub const KMALLOC_MIN_ALIGN: usize = 16;

/// Default kernel stack size for a new thread.
pub const KERNEL_STACK_SIZE: usize = 16 * PAGE_SIZE;

/// Default user stack size mapped for a new process's initial thread.
pub const USER_STACK_SIZE: usize = 256 * PAGE_SIZE;

/// Internal oscillator frequency driving PIT channel 0.
pub const PIT_BASE_FREQUENCY: u32 = 1_193_182;

/// Upper bound on the number of page frames the physical memory manager
/// can track, sized for 1 GiB of physical RAM. Memory reported by the
/// bootloader above this is ignored rather than tracked.
pub const MAX_FRAME_COUNT: usize = (1024 * 1024 * 1024) / PAGE_SIZE;
