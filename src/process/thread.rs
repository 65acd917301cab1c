//! The schedulable unit (§3 "Thread"): everything the scheduler needs to
//! suspend and resume a stream of execution, independent of which
//! process it belongs to.

/// Opaque thread identifier, unique for the kernel's lifetime (IDs are
/// never reused even after a thread is reaped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

/// §3's three-state model. A thread is never observably "ready but not
/// queued" — the RUNNING state covers both `current` and everything on
/// the runqueue, matching the invariant `state = RUNNING <=> on the
/// runqueue or == current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Running,
    Waiting,
    Zombie,
}

/// A schedulable unit. Owned by the global thread arena in
/// [`crate::process`]; the scheduler only ever holds its [`ThreadId`],
/// per the "non-owning index" design note.
pub struct Thread {
    pub tid: ThreadId,
    pub process: crate::process::ProcessId,
    pub state: ThreadState,
    /// Top of the kernel stack this thread was given at creation; needed
    /// to program `TSS.esp0` when this thread becomes `current`.
    pub kernel_stack_top: u32,
    /// Saved stack pointer. Meaningless while this thread is `current`
    /// (its real state lives on the live stack, not here); authoritative
    /// for every other thread.
    pub saved_sp: u32,
    /// Top of this thread's user stack, if it has one (kernel-only
    /// threads like idle do not).
    pub user_stack_top: Option<u32>,
    /// Ticks remaining in the current quantum; reset to
    /// [`crate::config::DEFAULT_QUANTUM_TICKS`] whenever it hits zero.
    pub quantum_remaining: u32,
}

impl Thread {
    pub fn quantum_expired(&self) -> bool {
        self.quantum_remaining == 0
    }
}
