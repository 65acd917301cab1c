//! Address space manager (§4.5 "Address-space and segment drivers").
//!
//! An [`AddressSpace`] owns a page directory and a sorted set of
//! [`Segment`]s; it dispatches fault/free/resize to whichever driver a
//! segment's flags name (see [`crate::mm::segment`]). Mutating the
//! segment set always requires the address space's own lock — there is
//! no separate reader path, matching §3's "mutation requires holding
//! the address-space lock" invariant.

use alloc::vec::Vec;

use crate::arch::x86::mmu::{self, PageFlags};
use crate::config::{ADDRESS_SPACE_END, PAGE_SIZE};
use crate::error::{Error, KResult};
use crate::mm::pmm;
use crate::mm::segment::{self, Driver, Segment, SegmentFlags};
use crate::sync::spinlock::SpinLock;

/// Below this, user segments are never placed — page zero stays
/// unmapped everywhere so a null-pointer dereference always faults.
const USER_VIRT_BASE: u32 = 0x0040_0000;

struct Inner {
    segments: Vec<Segment>,
    next_free: u32,
}

pub struct AddressSpace {
    pd_phys: u32,
    inner: SpinLock<Inner>,
}

static KERNEL_SPACE: SpinLock<Option<AddressSpace>> = SpinLock::new(None);

/// Captures the directory active at boot (built by the entry trampoline
/// in `main.rs` and [`crate::mm::bootstrap_paging`]) as the one, shared
/// kernel address space.
/// Called once from the `bootstrap` initcall stage.
pub fn init_kernel_address_space() {
    let space = AddressSpace {
        pd_phys: mmu::current_pd_phys(),
        inner: SpinLock::new(Inner { segments: Vec::new(), next_free: USER_VIRT_BASE }),
    };
    *KERNEL_SPACE.lock() = Some(space);
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

impl AddressSpace {
    pub fn pd_phys(&self) -> u32 {
        self.pd_phys
    }

    /// Builds a fresh user address space sharing the kernel's higher
    /// half (§3: "present in every user address space at fixed
    /// higher-half addresses").
    pub fn new_user() -> KResult<Self> {
        let pd_phys = mmu::new_address_space()?;
        Ok(Self {
            pd_phys,
            inner: SpinLock::new(Inner { segments: Vec::new(), next_free: USER_VIRT_BASE }),
        })
    }

    /// Runs `f` with this address space active, restoring whatever was
    /// active beforehand. A no-op switch (same directory already
    /// active) skips the CR3 reload entirely.
    pub fn with_active<R>(&self, f: impl FnOnce() -> R) -> R {
        let prev = mmu::current_pd_phys();
        let switched = prev != self.pd_phys;
        if switched {
            // SAFETY: every directory this module creates shares the
            // kernel's higher half, which is where the code and stack
            // executing this function live.
            unsafe { mmu::activate(self.pd_phys) };
        }
        let result = f();
        if switched {
            // SAFETY: `prev` was the live directory a moment ago; it
            // maps this same code and stack for the same reason.
            unsafe { mmu::activate(prev) };
        }
        result
    }

    fn insert_segment(&self, segment: Segment) -> KResult<Segment> {
        let mut inner = self.inner.lock();
        if inner.segments.iter().any(|s| overlaps(s, &segment)) {
            return Err(Error::Exist);
        }
        inner.next_free = inner.next_free.max(segment.end());
        inner.segments.push(segment);
        Ok(segment)
    }

    /// Allocates an anonymous segment of at least `size` bytes at the
    /// next free address. Lazily backed: no physical pages are touched
    /// until the first fault.
    pub fn segment_alloc(&self, size: usize, flags: SegmentFlags) -> KResult<Segment> {
        let size = align_up(size, PAGE_SIZE);
        let start = {
            let inner = self.inner.lock();
            align_up(inner.next_free as usize, PAGE_SIZE) as u32
        };
        if start as usize + size > ADDRESS_SPACE_END {
            return Err(Error::NoMem);
        }
        self.insert_segment(Segment { start, length: size, flags, driver: Driver::Normal })
    }

    /// Allocates a vnode-backed segment (incremental fault-in, resizable).
    pub fn segment_alloc_vnode(
        &self,
        size: usize,
        flags: SegmentFlags,
        handle: u64,
        file_offset: u64,
    ) -> KResult<Segment> {
        let size = align_up(size, PAGE_SIZE);
        let start = {
            let inner = self.inner.lock();
            align_up(inner.next_free as usize, PAGE_SIZE) as u32
        };
        if start as usize + size > ADDRESS_SPACE_END {
            return Err(Error::NoMem);
        }
        self.insert_segment(Segment {
            start,
            length: size,
            flags,
            driver: Driver::Vnode { handle, file_offset },
        })
    }

    /// Allocates a segment at a caller-chosen `virt` backed by
    /// already-existing physical frames, pinned and mapped eagerly.
    /// Rolls back every mapping on failure.
    pub fn segment_alloc_at(&self, virt: u32, frames: &[u32], flags: SegmentFlags) -> KResult<Segment> {
        let length = frames.len() * PAGE_SIZE;
        let segment = Segment { start: virt, length, flags, driver: Driver::Normal };
        {
            let inner = self.inner.lock();
            if inner.segments.iter().any(|s| overlaps(s, &segment)) {
                return Err(Error::Exist);
            }
        }
        self.with_active(|| segment::alloc_at(virt, frames, flags))?;
        self.insert_segment(segment)
    }

    /// Unmaps and releases a previously allocated segment.
    pub fn segment_free(&self, start: u32) -> KResult<()> {
        let removed = {
            let mut inner = self.inner.lock();
            let idx = inner.segments.iter().position(|s| s.start == start).ok_or(Error::Inval)?;
            inner.segments.remove(idx)
        };
        self.with_active(|| segment::free(&removed));
        Ok(())
    }

    /// Resizes a vnode-backed segment starting at `start`.
    pub fn resize(&self, start: u32, new_size: usize) -> KResult<()> {
        self.with_active(|| {
            let mut inner = self.inner.lock();
            let segment = inner.segments.iter_mut().find(|s| s.start == start).ok_or(Error::Inval)?;
            segment::resize(segment, new_size)
        })
    }

    /// Page-fault entry point (§4.5): finds the segment owning
    /// `faulting_virt` and dispatches to its driver. Assumes this
    /// address space is the one currently active, true whenever this is
    /// reached from the faulting thread's own page fault.
    pub fn fault(&self, faulting_virt: u32) -> KResult<()> {
        let target = {
            let inner = self.inner.lock();
            *inner.segments.iter().find(|s| s.contains(faulting_virt)).ok_or(Error::Inval)?
        };
        segment::fault(&target, faulting_virt)
    }

    /// Deep-copies every mapped page of `parent` into a freshly created
    /// address space (§4.9 "duplicate address space... at minimum a
    /// deep copy initially, COW is optional future work" — see
    /// `DESIGN.md` for why this crate stops at the deep copy).
    ///
    /// Pages that were never faulted into `parent` are left unmapped in
    /// the child too; the child's copy of the segment faults them in
    /// independently, which is observably identical to copying zeros.
    pub fn fork_from(parent: &AddressSpace) -> KResult<Self> {
        let child = Self::new_user()?;
        let parent_segments = parent.inner.lock().segments.clone();

        for segment in &parent_segments {
            let page_count = segment.length.div_ceil(PAGE_SIZE);
            let mut copies: Vec<(u32, u32)> = Vec::with_capacity(page_count);

            for i in 0..page_count {
                let virt = segment.start + (i * PAGE_SIZE) as u32;
                let Some(_phys) = mmu::translate(virt) else { continue };
                let Some(frame) = pmm::allocate() else {
                    for (_, phys) in &copies {
                        pmm::put(pmm::Frame::from_addr(*phys));
                    }
                    return Err(Error::NoMem);
                };
                {
                    let tmp = mmu::map_temporary(frame.addr());
                    // SAFETY: `virt` is mapped and readable because
                    // `parent` is the currently active address space
                    // here (fork always runs in the forking thread's
                    // own context); `tmp.virt()` is exclusively owned
                    // for the scope of this block.
                    unsafe {
                        core::ptr::copy_nonoverlapping(virt as *const u8, tmp.virt() as *mut u8, PAGE_SIZE);
                    }
                }
                copies.push((virt, frame.addr()));
            }

            let child_segment = *segment;
            let copies_ref = &copies;
            let map_result = child.with_active(|| -> KResult<()> {
                for &(virt, phys) in copies_ref {
                    mmu::map(virt, phys, segment.flags.page_flags())?;
                }
                Ok(())
            });
            if let Err(e) = map_result {
                for (_, phys) in &copies {
                    pmm::put(pmm::Frame::from_addr(*phys));
                }
                return Err(e);
            }
            child.insert_segment(child_segment)?;
        }

        Ok(child)
    }

    /// Tears down every segment and releases the directory frame.
    /// Called once, when a process's last thread exits.
    pub fn destroy(&self) {
        let segments = core::mem::take(&mut self.inner.lock().segments);
        self.with_active(|| {
            for segment in &segments {
                segment::free(segment);
            }
        });
        mmu::free_address_space_directory(self.pd_phys);
    }
}

fn overlaps(a: &Segment, b: &Segment) -> bool {
    a.start < b.end() && b.start < a.end()
}

/// The kernel's own address space, fully populated before userland ever
/// runs. Panics if called before [`init_kernel_address_space`].
pub fn with_kernel_space<R>(f: impl FnOnce(&AddressSpace) -> R) -> R {
    let guard = KERNEL_SPACE.lock();
    f(guard.as_ref().expect("kernel address space not yet initialised"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn segment_overlap_detects_half_open_ranges() {
        let a = Segment { start: 0x1000, length: PAGE_SIZE, flags: SegmentFlags::READ, driver: Driver::Normal };
        let b = Segment { start: 0x2000, length: PAGE_SIZE, flags: SegmentFlags::READ, driver: Driver::Normal };
        assert!(!overlaps(&a, &b));
        let c = Segment { start: 0x1f00, length: PAGE_SIZE, flags: SegmentFlags::READ, driver: Driver::Normal };
        assert!(overlaps(&a, &c));
    }
}
