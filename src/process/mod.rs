//! Process and thread lifecycle (§4.9, §3 "Process"/"Thread").
//!
//! Processes and threads live in two flat arenas keyed by id, per the
//! cyclic-reference design note in `SPEC_FULL.md` §9: a [`Thread`] holds
//! only its owning [`ProcessId`], never a pointer to the `Process`
//! itself, and [`crate::sched`]'s runqueue and wait queues hold only
//! [`ThreadId`]s. Teardown always goes threads -> address space ->
//! process slot.

pub mod pcb;
pub mod thread;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

pub use pcb::{Credentials, ExecSegment, Process, ProcessId};
pub use thread::{Thread, ThreadId, ThreadState};

use crate::arch::x86::context;
use crate::error::{Error, KResult};
use crate::mm::segment::SegmentFlags;
use crate::mm::vas::AddressSpace;
use crate::sync::spinlock::SpinLock;
use crate::sync::wait_queue::WaitQueue;

static PROCESSES: SpinLock<BTreeMap<ProcessId, Process>> = SpinLock::new(BTreeMap::new());
static THREADS: SpinLock<BTreeMap<ThreadId, Thread>> = SpinLock::new(BTreeMap::new());

static NEXT_PID: AtomicU32 = AtomicU32::new(1);
static NEXT_TID: AtomicU32 = AtomicU32::new(1);

/// Threads parked in `waitpid`, woken (broadcast — every waiter
/// rechecks its own condition) whenever any process exits.
static CHILD_EXIT_WAITERS: WaitQueue = WaitQueue::new();

/// PID 0: owns no address space of its own (its threads run against
/// whichever address space — always the kernel's — happens to be
/// active) and never exits.
pub const KERNEL_PROCESS: ProcessId = ProcessId(0);

fn alloc_pid() -> ProcessId {
    ProcessId(NEXT_PID.fetch_add(1, Ordering::Relaxed))
}

fn alloc_tid() -> ThreadId {
    ThreadId(NEXT_TID.fetch_add(1, Ordering::Relaxed))
}

/// Runs `f` with a reference to `tid`'s [`Thread`], if it still exists.
pub fn with_thread<R>(tid: ThreadId, f: impl FnOnce(&Thread) -> R) -> Option<R> {
    THREADS.lock().get(&tid).map(f)
}

/// Mutable counterpart of [`with_thread`].
pub fn with_thread_mut<R>(tid: ThreadId, f: impl FnOnce(&mut Thread) -> R) -> Option<R> {
    THREADS.lock().get_mut(&tid).map(f)
}

/// Runs `f` with a reference to `pid`'s [`Process`], if it still exists.
pub fn with_process<R>(pid: ProcessId, f: impl FnOnce(&Process) -> R) -> Option<R> {
    PROCESSES.lock().get(&pid).map(f)
}

/// Mutable counterpart of [`with_process`].
pub fn with_process_mut<R>(pid: ProcessId, f: impl FnOnce(&mut Process) -> R) -> Option<R> {
    PROCESSES.lock().get_mut(&pid).map(f)
}

/// Runs `f` against the current thread's owning process's address
/// space. `None` for a kernel-only thread (PID 0, no address space of
/// its own) or if the current thread has no live process entry yet.
pub fn with_current_address_space<R>(f: impl FnOnce(&AddressSpace) -> R) -> Option<R> {
    let pid = current_process_id()?;
    PROCESSES.lock().get(&pid)?.address_space.as_ref().map(f)
}

pub fn current_process_id() -> Option<ProcessId> {
    let tid = crate::sched::current_thread_id();
    with_thread(tid, |t| t.process)
}

/// Creates PID 0. Called once from the `normal` initcall stage, right
/// before the scheduler starts accepting preemption ticks.
pub fn init() {
    let process = Process {
        pid: KERNEL_PROCESS,
        name: String::from("kernel"),
        credentials: Credentials::root(),
        address_space: None,
        threads: Vec::new(),
        zombie_threads: VecDeque::new(),
        exit_status: None,
        parent: None,
        children: Vec::new(),
        brk_segment_start: None,
        brk_current: 0,
    };
    PROCESSES.lock().insert(KERNEL_PROCESS, process);
}

/// Registers the flow executing this call (the boot stack, still running
/// on whatever it was before any thread existed) as PID 0's first
/// thread. Its `saved_sp` is never read until the first time it is
/// switched away from, at which point [`crate::sched::schedule`] writes
/// a real value into it. Called exactly once, from `sched::init`.
pub fn adopt_current_as_kernel_thread() -> ThreadId {
    let tid = alloc_tid();
    let thread = Thread {
        tid,
        process: KERNEL_PROCESS,
        state: ThreadState::Running,
        kernel_stack_top: 0,
        saved_sp: 0,
        user_stack_top: None,
        quantum_remaining: crate::config::DEFAULT_QUANTUM_TICKS,
    };
    THREADS.lock().insert(tid, thread);
    with_process_mut(KERNEL_PROCESS, |p| p.threads.push(tid));
    tid
}

/// Raw pointer to `tid`'s saved-stack-pointer slot, for
/// [`crate::sched::schedule`]'s call into
/// [`crate::arch::x86::context::switch_to`], which needs a location
/// `switch_to_asm` can store into directly rather than a closure.
///
/// # Safety (informal)
/// The returned pointer is valid only until the next call that inserts
/// into or removes from the thread arena — a `BTreeMap` node split can
/// relocate existing entries. Callers must use it immediately, with no
/// intervening thread creation or teardown.
pub fn thread_saved_sp_ptr(tid: ThreadId) -> *mut u32 {
    let mut threads = THREADS.lock();
    &mut threads.get_mut(&tid).expect("live thread").saved_sp as *mut u32
}

/// The physical page directory of `pid`'s address space, or `None` for
/// the kernel process (whose threads run under whatever directory is
/// already active, since the kernel half is mapped everywhere).
pub fn address_space_pd_phys(pid: ProcessId) -> Option<u32> {
    with_process(pid, |p| p.address_space.as_ref().map(AddressSpace::pd_phys)).flatten()
}

/// Maps and zeroes a fresh kernel stack out of the shared kernel address
/// space (every kernel stack lives in the kernel's higher half, so it's
/// reachable identically regardless of which user address space, if
/// any, happens to be active).
fn allocate_kernel_stack() -> u32 {
    crate::mm::vas::with_kernel_space(|space| {
        let segment = space
            .segment_alloc(
                crate::config::KERNEL_STACK_SIZE,
                SegmentFlags::READ | SegmentFlags::WRITE | SegmentFlags::CLEAR,
            )
            .expect("out of virtual address space for a kernel stack");
        for page in 0..segment.length / crate::config::PAGE_SIZE {
            let virt = segment.start + (page * crate::config::PAGE_SIZE) as u32;
            space.fault(virt).expect("eagerly populating a fresh kernel stack cannot fail");
        }
        segment.end()
    })
}

/// Spawns a new kernel-only thread under PID 0, ready to run. Used for
/// the idle thread and other kernel worker threads.
pub fn spawn_kernel_thread(entry: extern "C" fn(usize) -> !, arg: usize) -> ThreadId {
    let tid = alloc_tid();
    let stack_top = allocate_kernel_stack();
    let saved_sp = context::new_kernel_thread_stack(stack_top, entry, arg);

    let thread = Thread {
        tid,
        process: KERNEL_PROCESS,
        state: ThreadState::Running,
        kernel_stack_top: stack_top,
        saved_sp,
        user_stack_top: None,
        quantum_remaining: crate::config::DEFAULT_QUANTUM_TICKS,
    };
    THREADS.lock().insert(tid, thread);
    with_process_mut(KERNEL_PROCESS, |p| p.threads.push(tid));
    crate::sched::enqueue_new_thread(tid);
    tid
}

/// Creates a new process as a deep copy of `parent_tid`'s process
/// address space, with a single thread that resumes ring-3 execution at
/// `return_eip`/`return_esp` — the point the parent itself trapped into
/// the kernel at (§4.9 `fork`). Returns the child's PID.
pub fn fork(parent_tid: ThreadId, return_eip: u32, return_esp: u32) -> KResult<ProcessId> {
    let parent_pid = with_thread(parent_tid, |t| t.process).ok_or(Error::Inval)?;

    let (child_space, credentials, name) = {
        let processes = PROCESSES.lock();
        let parent = processes.get(&parent_pid).ok_or(Error::Inval)?;
        let parent_space = parent.address_space.as_ref().ok_or(Error::Perm)?;
        (AddressSpace::fork_from(parent_space)?, parent.credentials, parent.name.clone())
    };

    let child_pid = alloc_pid();
    let child_tid = alloc_tid();
    let stack_top = allocate_kernel_stack();
    let saved_sp = context::new_user_thread_stack(stack_top, return_eip, return_esp);

    let child_thread = Thread {
        tid: child_tid,
        process: child_pid,
        state: ThreadState::Running,
        kernel_stack_top: stack_top,
        saved_sp,
        user_stack_top: Some(return_esp),
        quantum_remaining: crate::config::DEFAULT_QUANTUM_TICKS,
    };

    let child_process = Process {
        pid: child_pid,
        name,
        credentials,
        address_space: Some(child_space),
        threads: alloc::vec![child_tid],
        zombie_threads: VecDeque::new(),
        exit_status: None,
        parent: Some(parent_pid),
        children: Vec::new(),
        brk_segment_start: None,
        brk_current: 0,
    };

    THREADS.lock().insert(child_tid, child_thread);
    PROCESSES.lock().insert(child_pid, child_process);
    with_process_mut(parent_pid, |p| p.children.push(child_pid));

    crate::sched::enqueue_new_thread(child_tid);
    Ok(child_pid)
}

/// Replaces the current process's user segments with those named by
/// `segments` (§4.9 `exec`), populated by the ELF loader (§6
/// collaborator, out of scope here) before this is called — this
/// function only knows how to install what it is handed. Recording
/// `user_esp` as the thread's new user stack top is all the bookkeeping
/// this layer owns; redirecting the interrupted context to `entry_eip`
/// is the calling syscall handler's job, via
/// [`crate::irq::Registers::set_instruction_pointer`].
pub fn exec(tid: ThreadId, user_esp: u32, segments: &[ExecSegment]) -> KResult<()> {
    let pid = with_thread(tid, |t| t.process).ok_or(Error::Inval)?;

    let result: KResult<()> = with_process(pid, |p| {
        let space = p.address_space.as_ref().ok_or(Error::Perm)?;
        space.with_active(|| -> KResult<()> {
            for seg in segments {
                space.segment_alloc(seg.size, seg.flags)?;
            }
            Ok(())
        })
    })
    .ok_or(Error::Inval)?;
    result?;

    with_thread_mut(tid, |t| t.user_stack_top = Some(user_esp));
    Ok(())
}

fn wake_child_waiters() {
    while let Some(tid) = CHILD_EXIT_WAITERS.dequeue() {
        crate::sched::unblock(tid);
    }
}

/// Marks the calling thread's process exited with `status` once its
/// last thread has exited, releases its address space, wakes a parent
/// blocked in `waitpid`, and hands control to the scheduler without
/// re-enqueuing the exiting thread (§4.7 Termination).
pub fn exit_current(status: i32) -> ! {
    let tid = crate::sched::current_thread_id();
    let pid = with_thread(tid, |t| t.process).expect("current thread always has a process");

    with_thread_mut(tid, |t| t.state = ThreadState::Zombie);

    let last_thread = with_process_mut(pid, |p| {
        p.threads.retain(|&t| t != tid);
        p.zombie_threads.push_back(tid);
        p.threads.is_empty()
    })
    .unwrap_or(false);

    if last_thread {
        with_process_mut(pid, |p| {
            p.exit_status = Some(status);
            if let Some(space) = &p.address_space {
                space.destroy();
            }
        });
        wake_child_waiters();
    }

    crate::sched::terminate_current();
}

/// Blocks until a child of `parent_tid`'s process exits (or `target`
/// specifically, if given), reaps it, and returns its PID and exit
/// status.
pub fn waitpid(parent_tid: ThreadId, target: Option<ProcessId>) -> KResult<(ProcessId, i32)> {
    let parent_pid = with_thread(parent_tid, |t| t.process).ok_or(Error::Inval)?;
    loop {
        let reaped = {
            let mut processes = PROCESSES.lock();
            let zombie_child = processes.get(&parent_pid).ok_or(Error::Inval)?.children.iter().copied().find(
                |&cid| {
                    target.map(|t| t == cid).unwrap_or(true)
                        && processes.get(&cid).map(Process::is_zombie).unwrap_or(false)
                },
            );
            match zombie_child {
                Some(cid) => {
                    let child = processes.remove(&cid).expect("found above under the same lock");
                    if let Some(parent) = processes.get_mut(&parent_pid) {
                        parent.children.retain(|&c| c != cid);
                    }
                    Some((cid, child.exit_status.expect("is_zombie implies exit_status is set")))
                }
                None => None,
            }
        };
        if let Some(result) = reaped {
            return Ok(result);
        }
        if let Some(t) = target {
            let still_a_child = with_process(parent_pid, |p| p.children.contains(&t)).unwrap_or(false);
            if !still_a_child {
                return Err(Error::Inval);
            }
        }
        CHILD_EXIT_WAITERS.enqueue(parent_tid);
        crate::sched::block_current();
    }
}

/// Terminates the current thread's process with status -1
/// (conventional "killed by fault" status); used by the page-fault
/// handler when a user-mode access violation has no recovery.
pub fn terminate_current_on_fault(_faulting_addr: u32) -> ! {
    exit_current(-1)
}

/// Queries or grows the calling process's `brk`/`sbrk` heap (§6). `None`
/// just returns the current break; `Some(target)` grows the backing
/// segment (a resizable vnode-shaped segment reused purely for its
/// growth support, with no real vnode behind it) up to `target` and
/// returns it. Shrinking below the current break is rejected rather
/// than silently ignored, since callers pass a computed absolute target
/// rather than a signed delta.
pub fn brk(pid: ProcessId, target: Option<u32>) -> KResult<u32> {
    let Some(target) = target else {
        return with_process(pid, |p| p.brk_current).ok_or(Error::Inval);
    };

    let space_ptr: *const AddressSpace = with_process(pid, |p| p.address_space.as_ref().map(|s| s as *const _))
        .ok_or(Error::Inval)?
        .ok_or(Error::Perm)?;
    // SAFETY: the address space outlives this call: it is only ever torn
    // down by `exit_current`/`kill` on this same process, and a process
    // cannot be tearing itself down while handling its own syscall.
    let space = unsafe { &*space_ptr };

    let start = match with_process(pid, |p| p.brk_segment_start).flatten() {
        Some(start) => start,
        None => {
            let segment = space.segment_alloc_vnode(
                crate::config::PAGE_SIZE,
                SegmentFlags::READ | SegmentFlags::WRITE | SegmentFlags::USER,
                0,
                0,
            )?;
            with_process_mut(pid, |p| {
                p.brk_segment_start = Some(segment.start);
                p.brk_current = segment.start;
            });
            segment.start
        }
    };

    if target < start {
        return Err(Error::Inval);
    }
    let new_size = ((target - start) as usize).max(crate::config::PAGE_SIZE);
    space.resize(start, new_size)?;
    with_process_mut(pid, |p| p.brk_current = target);
    Ok(target)
}

/// Unconditionally terminates `pid` (§4.9 `kill`, minus signal
/// delivery — out of scope per Non-goals). Only meaningful against a
/// process other than the caller's own; the caller exits through
/// [`exit_current`] instead.
pub fn kill(pid: ProcessId) -> KResult<()> {
    let threads = with_process(pid, |p| p.threads.clone()).ok_or(Error::NoEnt)?;
    for &tid in &threads {
        // Marked ZOMBIE directly rather than through `sched::unblock`:
        // a killed thread must never run again, including a turn on the
        // runqueue. A thread parked on some wait queue (a semaphore's,
        // `CHILD_EXIT_WAITERS`) is left there rather than hunted down
        // and removed; `sched::unblock` ignores a non-WAITING thread,
        // so whichever wait queue dequeues it later finds it ZOMBIE and
        // drops it instead of resurrecting it.
        with_thread_mut(tid, |t| t.state = ThreadState::Zombie);
    }
    with_process_mut(pid, |p| {
        p.zombie_threads.extend(p.threads.drain(..));
        p.exit_status = Some(-1);
        if let Some(space) = &p.address_space {
            space.destroy();
        }
    });
    wake_child_waiters();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn pid_allocation_is_monotonic_and_unique() {
        let a = alloc_pid();
        let b = alloc_pid();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }
}
