//! Process control block (§3 "Process") and the credentials block §3.E
//! of `SPEC_FULL.md` spells out.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::mm::segment::SegmentFlags;
use crate::mm::vas::AddressSpace;
use crate::process::thread::ThreadId;

/// Opaque process identifier, unique for the kernel's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

/// Real/effective/saved UID and GID, trimmed of the capability fields a
/// fuller credentials model would carry (out of scope, §1 Non-goals).
#[derive(Debug, Clone, Copy)]
pub struct Credentials {
    pub ruid: u32,
    pub euid: u32,
    pub suid: u32,
    pub rgid: u32,
    pub egid: u32,
    pub sgid: u32,
}

impl Credentials {
    pub const fn root() -> Self {
        Self { ruid: 0, euid: 0, suid: 0, rgid: 0, egid: 0, sgid: 0 }
    }

    pub fn is_root(&self) -> bool {
        self.ruid == 0
    }
}

/// One segment of an executable image, as handed to [`super::exec`] by
/// the ELF loader (§6 collaborator, out of scope here): this is the
/// boundary between "a file has been parsed" and "an address space has
/// the resulting segments".
pub struct ExecSegment {
    pub virt: u32,
    pub size: usize,
    pub flags: SegmentFlags,
}

/// A process (§3): an address space, one or more threads, and the
/// bookkeeping `fork`/`exit`/`waitpid` need.
pub struct Process {
    pub pid: ProcessId,
    pub name: String,
    pub credentials: Credentials,
    /// `None` only for [`super::KERNEL_PROCESS`], whose threads always
    /// run against whichever address space is active rather than one
    /// the process itself owns.
    pub address_space: Option<AddressSpace>,
    pub threads: Vec<ThreadId>,
    /// Threads of this process that have exited but whose resources
    /// [`super::exit_thread`] has not yet fully torn down — distinct
    /// from the runqueue/wait-queue membership §3 requires of a live
    /// thread.
    pub zombie_threads: VecDeque<ThreadId>,
    pub exit_status: Option<i32>,
    pub parent: Option<ProcessId>,
    pub children: Vec<ProcessId>,
    /// Start of the `brk`/`sbrk` heap segment, lazily allocated on the
    /// first call that actually grows it (§6 `brk`/`sbrk`).
    pub brk_segment_start: Option<u32>,
    /// Current break. Equal to `brk_segment_start` until the first
    /// growth.
    pub brk_current: u32,
}

impl Process {
    pub fn is_zombie(&self) -> bool {
        self.exit_status.is_some()
    }
}
