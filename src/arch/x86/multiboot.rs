//! Multiboot 1 header and boot information parsing.
//!
//! The loader (GRUB or compatible) validates the header below, loads the
//! kernel, and jumps to `_start` with `eax` = 0x2BADB002 and `ebx` =
//! the physical address of a [`MultibootInfo`].

use core::arch::global_asm;

pub const BOOT_MAGIC: u32 = 0x2BADB002;
const HEADER_MAGIC: u32 = 0x1BADB002;
const HEADER_FLAGS: u32 = 0x0000_0003; // align modules on page boundaries + provide mem_* fields

global_asm!(
    r#"
.section .multiboot_header, "aw"
.align 4
multiboot_header_start:
    .long {magic}
    .long {flags}
    .long -({magic} + {flags})
multiboot_header_end:
"#,
    magic = const HEADER_MAGIC,
    flags = const HEADER_FLAGS,
);

const MMAP_AVAILABLE: u32 = 1;

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct MultibootInfo {
    pub flags: u32,
    pub mem_lower: u32,
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
    pub syms: [u32; 4],
    pub mmap_length: u32,
    pub mmap_addr: u32,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct MmapEntry {
    size: u32,
    base_addr: u64,
    length: u64,
    entry_type: u32,
}

/// A single usable or reserved region from the bootloader's memory map.
#[derive(Clone, Copy, Debug)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub available: bool,
}

/// Iterates the memory-map entries the bootloader passed in, in order.
///
/// # Safety
/// `info` must point at a valid [`MultibootInfo`] still identity-mapped
/// (this is only ever called during early boot, before paging changes
/// the low mapping).
pub unsafe fn memory_regions(info: *const MultibootInfo) -> impl Iterator<Item = MemoryRegion> {
    // SAFETY: contract documented on this function.
    let info = unsafe { &*info };
    let has_mmap = info.flags & (1 << 6) != 0;
    let mut cursor = if has_mmap { info.mmap_addr } else { 0 };
    let end = if has_mmap {
        info.mmap_addr + info.mmap_length
    } else {
        0
    };

    core::iter::from_fn(move || {
        if cursor >= end {
            return None;
        }
        // SAFETY: `cursor` stays within [mmap_addr, mmap_addr+mmap_length)
        // by the loop condition above, and the bootloader guarantees
        // each entry's `size` field describes a fully present record.
        let entry = unsafe { &*(cursor as *const MmapEntry) };
        let region = MemoryRegion {
            base: entry.base_addr,
            length: entry.length,
            available: entry.entry_type == MMAP_AVAILABLE,
        };
        cursor += entry.size + 4;
        Some(region)
    })
}
