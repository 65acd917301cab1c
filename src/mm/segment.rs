//! Segment drivers: the policy an address space consults on page fault
//! and on explicit free/resize, selected per-segment by its flags.

use bitflags::bitflags;

use crate::arch::x86::mmu::{self, PageFlags};
use crate::config::PAGE_SIZE;
use crate::error::{Error, KResult};
use crate::mm::pmm;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC  = 1 << 2;
        const USER  = 1 << 3;
        /// Zero newly faulted-in pages before handing them to the
        /// faulting thread.
        const CLEAR = 1 << 4;
    }
}

impl SegmentFlags {
    pub(crate) fn page_flags(self) -> PageFlags {
        let mut flags = PageFlags::empty();
        if self.contains(SegmentFlags::WRITE) {
            flags |= PageFlags::WRITABLE;
        }
        if self.contains(SegmentFlags::USER) {
            flags |= PageFlags::USER;
        }
        flags
    }
}

/// Which driver backs a segment. Vnode carries an opaque identity for
/// the backing object; nothing here interprets it, since resolving it
/// into actual file content is outside this subsystem.
#[derive(Clone, Copy, Debug)]
pub enum Driver {
    Normal,
    Vnode { handle: u64, file_offset: u64 },
}

/// One contiguous, page-aligned region of an address space's virtual
/// range.
#[derive(Clone, Copy, Debug)]
pub struct Segment {
    pub start: u32,
    pub length: usize,
    pub flags: SegmentFlags,
    pub driver: Driver,
}

impl Segment {
    pub fn end(&self) -> u32 {
        self.start + self.length as u32
    }

    pub fn contains(&self, virt: u32) -> bool {
        virt >= self.start && virt < self.end()
    }

    fn page_count(&self) -> usize {
        (self.length).div_ceil(PAGE_SIZE)
    }
}

/// Handles a page fault inside `segment` at `faulting_virt`, dispatching
/// to the driver named by `segment.driver`.
pub fn fault(segment: &Segment, faulting_virt: u32) -> KResult<()> {
    match segment.driver {
        Driver::Normal => normal_fault(segment, faulting_virt),
        Driver::Vnode { .. } => vnode_fault(segment, faulting_virt),
    }
}

fn page_aligned(virt: u32) -> u32 {
    virt & !((PAGE_SIZE as u32) - 1)
}

fn normal_fault(segment: &Segment, faulting_virt: u32) -> KResult<()> {
    let page = page_aligned(faulting_virt);
    let frame = pmm::allocate().ok_or(Error::NoMem)?;
    mmu::map(page, frame.addr(), segment.flags.page_flags()).map_err(|e| {
        pmm::put(frame);
        e
    })?;
    if segment.flags.contains(SegmentFlags::CLEAR) {
        // SAFETY: `page` was just mapped writable by this same call.
        unsafe {
            core::ptr::write_bytes(page as *mut u8, 0, PAGE_SIZE);
        }
    }
    Ok(())
}

fn vnode_fault(segment: &Segment, faulting_virt: u32) -> KResult<()> {
    let page = page_aligned(faulting_virt);
    if mmu::is_mapped(page) {
        // Incremental resize already populated this page; nothing to do.
        return Ok(());
    }
    normal_fault(segment, faulting_virt)
}

/// Unmaps and releases every frame backing `segment`. Called when a
/// segment is explicitly freed or its owning address space is torn
/// down.
pub fn free(segment: &Segment) {
    for i in 0..segment.page_count() {
        let virt = segment.start + (i * PAGE_SIZE) as u32;
        if let Some(phys) = mmu::unmap(virt) {
            pmm::put(pmm::Frame::from_addr(phys));
        }
    }
}

/// Resizes a vnode-backed segment in place. Growing just widens the
/// segment (pages are faulted in lazily); shrinking releases the frames
/// that fall outside the new length immediately.
///
/// Returns [`Error::NotSupported`] for anything but a vnode segment —
/// the normal driver has no backing object to resize against.
pub fn resize(segment: &mut Segment, new_size: usize) -> KResult<()> {
    if !matches!(segment.driver, Driver::Vnode { .. }) {
        return Err(Error::NotSupported);
    }
    if new_size > segment.length {
        segment.length = new_size;
        return Ok(());
    }
    let old_pages = segment.page_count();
    segment.length = new_size;
    let new_pages = segment.page_count();
    for i in new_pages..old_pages {
        let virt = segment.start + (i * PAGE_SIZE) as u32;
        if let Some(phys) = mmu::unmap(virt) {
            pmm::put(pmm::Frame::from_addr(phys));
        }
    }
    Ok(())
}

/// Pins `frames` (incrementing each refcount) and maps them eagerly
/// starting at `virt`, in order. Rolls back every mapping made so far
/// on the first failure, including the refcount increments.
pub fn alloc_at(virt: u32, frames: &[u32], flags: SegmentFlags) -> KResult<()> {
    for (i, &phys) in frames.iter().enumerate() {
        let frame = pmm::Frame::from_addr(phys);
        pmm::get(frame);
        let page_virt = virt + (i * PAGE_SIZE) as u32;
        if let Err(e) = mmu::map(page_virt, phys, flags.page_flags()) {
            pmm::put(frame);
            for j in 0..i {
                let rollback_virt = virt + (j * PAGE_SIZE) as u32;
                if let Some(p) = mmu::unmap(rollback_virt) {
                    pmm::put(pmm::Frame::from_addr(p));
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn segment_contains_is_half_open() {
        let seg = Segment {
            start: 0x1000,
            length: PAGE_SIZE,
            flags: SegmentFlags::READ,
            driver: Driver::Normal,
        };
        assert!(seg.contains(0x1000));
        assert!(seg.contains(0x1fff));
        assert!(!seg.contains(0x2000));
    }

    #[test_case]
    fn vnode_resize_rejects_normal_driver() {
        let mut seg = Segment {
            start: 0,
            length: PAGE_SIZE,
            flags: SegmentFlags::READ | SegmentFlags::WRITE,
            driver: Driver::Normal,
        };
        assert_eq!(resize(&mut seg, 2 * PAGE_SIZE), Err(Error::NotSupported));
    }
}
