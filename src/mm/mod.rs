//! Virtual memory subsystem: physical frames, the MMU mapper (in
//! [`crate::arch::x86::mmu`]), kernel heap, address spaces, segments,
//! and page-fault handling.

pub mod heap;
pub mod page_fault;
pub mod pmm;
pub mod segment;
pub mod vas;

use crate::arch::x86::mmu::{self, PageFlags};
use crate::config::KERNEL_LMA;

extern "C" {
    /// Physical address one past the end of the kernel image, provided
    /// by `link.ld` (`__kernel_end - KERNEL_VMA`).
    static __kernel_end_phys: u8;
}

/// Physical address one past the end of the kernel image.
pub fn kernel_end_phys() -> u32 {
    // SAFETY: only the address of the symbol is taken, never its value.
    unsafe { &raw const __kernel_end_phys as u32 }
}

/// Builds the kernel's real, per-page bootstrap page directory and
/// switches to it, replacing the provisional identity mapping `boot.rs`
/// built by hand in assembly just to reach [`crate::bootstrap::early_entry`]
/// with paging already on. Identity-maps `[0, kernel_end_phys())` and
/// mirrors the kernel image at `KERNEL_VMA`, then installs the
/// recursive self-map (§4.4) and activates the directory.
///
/// Called once from the `bootstrap` initcall stage, after [`pmm::init`]
/// (this function allocates frames for the directory and its tables)
/// and before anything calls into [`heap`] or [`vas`].
///
/// # Safety
/// Must run exactly once, while still executing under a mapping (the
/// provisional one `boot.rs` installs) that covers both the code
/// currently running and every frame [`pmm::allocate`] is about to hand
/// out — true here because both span the low few megabytes of physical
/// memory, where the PMM's free-cursor starts handing out frames right
/// after the reserved kernel range.
pub unsafe fn bootstrap_paging() {
    let pd_phys = pmm::allocate().expect("out of memory building the bootstrap page directory").addr();
    let end = kernel_end_phys();
    let kernel_size = end - KERNEL_LMA;
    // SAFETY: delegated to this function's own contract above.
    unsafe {
        mmu::identity_map(pd_phys, 0, end, PageFlags::WRITABLE);
        mmu::early_map_range(pd_phys, crate::config::KERNEL_VMA as u32, KERNEL_LMA, kernel_size, PageFlags::WRITABLE);
        mmu::install_recursive_mapping(pd_phys);
        mmu::activate(pd_phys);
    }
}
