//! Global Descriptor Table: flat kernel/user code+data segments plus the
//! TSS used to supply `esp0` on every ring-3 -> ring-0 transition.

use core::mem::size_of;

use spin::Mutex;

const GDT_ENTRIES: usize = 6;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
const TSS_SELECTOR: u16 = 0x28;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    const fn flat(access: u8, granularity: u8) -> Self {
        Self {
            limit_low: 0xffff,
            base_low: 0,
            base_mid: 0,
            access,
            granularity: granularity | 0x0f,
            base_high: 0,
        }
    }

    fn tss(base: u32, limit: u32) -> Self {
        Self {
            limit_low: (limit & 0xffff) as u16,
            base_low: (base & 0xffff) as u16,
            base_mid: ((base >> 16) & 0xff) as u8,
            access: 0x89, // present, ring0, 32-bit TSS (available)
            granularity: ((limit >> 16) & 0x0f) as u8,
            base_high: ((base >> 24) & 0xff) as u8,
        }
    }
}

#[repr(C, packed)]
pub struct Tss {
    prev_tss: u32,
    pub esp0: u32,
    pub ss0: u32,
    _unused: [u32; 23],
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            prev_tss: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SELECTOR as u32,
            _unused: [0; 23],
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

static GDT: Mutex<[GdtEntry; GDT_ENTRIES]> = Mutex::new([GdtEntry::null(); GDT_ENTRIES]);
static TSS: Mutex<Tss> = Mutex::new(Tss::new());

/// Builds the flat GDT (kernel/user code+data covering the full 4 GiB)
/// and the TSS, then loads GDTR and TR. Called once during the
/// `bootstrap` initcall stage.
pub fn init() {
    {
        let mut gdt = GDT.lock();
        gdt[0] = GdtEntry::null();
        gdt[1] = GdtEntry::flat(0x9a, 0xc0); // kernel code, ring0
        gdt[2] = GdtEntry::flat(0x92, 0xc0); // kernel data, ring0
        gdt[3] = GdtEntry::flat(0xfa, 0xc0); // user code, ring3
        gdt[4] = GdtEntry::flat(0xf2, 0xc0); // user data, ring3

        let tss_addr = &*TSS.lock() as *const Tss as u32;
        gdt[5] = GdtEntry::tss(tss_addr, (size_of::<Tss>() - 1) as u32);
    }

    let pointer = GdtPointer {
        limit: (size_of::<[GdtEntry; GDT_ENTRIES]>() - 1) as u16,
        base: GDT.lock().as_ptr() as u32,
    };

    // SAFETY: `pointer` describes the GDT initialised immediately above;
    // the far-jump reloads CS with the flat kernel code selector and the
    // subsequent moves reload the remaining segment registers, which is
    // the standard GDT-reload sequence.
    unsafe {
        core::arch::asm!(
            "lgdt [{0}]",
            "ljmp {cs}, 2f",
            "2:",
            "mov {ds:e}, {data}",
            "mov ds, {ds:x}",
            "mov es, {ds:x}",
            "mov fs, {ds:x}",
            "mov gs, {ds:x}",
            "mov ss, {ds:x}",
            in(reg) &pointer,
            cs = const KERNEL_CODE_SELECTOR,
            data = in(reg) KERNEL_DATA_SELECTOR as u32,
            ds = out(reg) _,
            options(nostack),
        );
        core::arch::asm!("ltr {0:x}", in(reg) TSS_SELECTOR, options(nostack, nomem));
    }
}

/// Updates the kernel stack pointer the CPU switches to on the next
/// ring-3 -> ring-0 transition (interrupt, syscall). Called by the
/// scheduler's context switch whenever `current` changes.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}
