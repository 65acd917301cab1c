//! Preemptive round-robin scheduler (§4.7).
//!
//! A single global runqueue, FIFO, on one CPU: there is exactly one
//! `current` thread and a `VecDeque<ThreadId>` of everything else that is
//! RUNNING. Suspension happens only inside [`schedule`], and only after
//! the bookkeeping lock below has already been dropped — so the "no
//! locks across suspension except the scheduler lock" rule from
//! `SPEC_FULL.md` §9 holds trivially, because no lock is ever actually
//! held across the [`context::switch_to`] call itself. Holding it across
//! the switch would be unsound here: every suspended thread has its own
//! frozen call to `schedule()` sitting on its own stack, each having
//! taken the lock independently, so at any instant more than one of
//! them could be "holding" the same guard without ever releasing it.
//! Dropping it before the switch avoids that entirely.

use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::x86::{context, gdt, mmu, port};
use crate::config::DEFAULT_QUANTUM_TICKS;
use crate::process::{self, ThreadId, ThreadState};
use crate::sync::spinlock::SpinLock;

struct State {
    runqueue: VecDeque<ThreadId>,
    current: ThreadId,
}

static STATE: SpinLock<Option<State>> = SpinLock::new(None);

/// Set by [`tick`] when the current thread's quantum has expired;
/// consumed (and cleared) by [`preemption_pending`], which
/// `irq::dispatch` polls exactly once per interrupt return.
static PREEMPTION_PENDING: AtomicBool = AtomicBool::new(false);

/// Adopts the flow executing this call — the boot stack, still running
/// under whatever directory `bootstrap` last activated — as the first
/// thread, with an empty runqueue. Called once from the `normal`
/// initcall stage, after `process::init`.
pub fn init() {
    let tid = process::adopt_current_as_kernel_thread();
    *STATE.lock() = Some(State { runqueue: VecDeque::new(), current: tid });
}

fn state_current() -> ThreadId {
    STATE.lock().as_ref().expect("scheduler not initialised").current
}

pub fn current_thread_id() -> ThreadId {
    state_current()
}

/// Stashes the interrupted context's stack pointer into the current
/// thread's record before a handler (in particular `execve`) runs, and
/// the companion read in [`current_thread_sp`] hands back whatever value
/// is there afterwards — letting a handler redirect a user thread's
/// stack by writing through [`process::with_thread_mut`] instead of
/// through the interrupt frame directly. Harmless no-op bookkeeping for
/// a kernel-only thread: its frame's `useresp` is never consulted on
/// return (`idt::common_interrupt_handler` only writes it back when
/// `from_userspace()`).
pub fn current_thread_save_sp(sp: u32) {
    let tid = state_current();
    process::with_thread_mut(tid, |t| t.user_stack_top = Some(sp));
}

pub fn current_thread_sp() -> u32 {
    let tid = state_current();
    process::with_thread(tid, |t| t.user_stack_top.unwrap_or(0)).unwrap_or(0)
}

/// Called once per timer tick (§4.7 "quantum-based preemption"). Expiry
/// just raises a flag; the actual reschedule happens on interrupt return,
/// in `irq::dispatch`, never from inside the tick handler itself.
pub fn tick() {
    let tid = state_current();
    let expired = process::with_thread_mut(tid, |t| {
        t.quantum_remaining = t.quantum_remaining.saturating_sub(1);
        if t.quantum_remaining == 0 {
            t.quantum_remaining = DEFAULT_QUANTUM_TICKS;
            true
        } else {
            false
        }
    })
    .unwrap_or(false);
    if expired {
        PREEMPTION_PENDING.store(true, Ordering::SeqCst);
    }
}

/// Consumes and clears the pending-preemption flag.
pub fn preemption_pending() -> bool {
    PREEMPTION_PENDING.swap(false, Ordering::SeqCst)
}

extern "C" fn timer_tick_handler(_vector: u8, _error_code: u32, _regs: &mut crate::irq::Registers, _data: *mut u8) {
    tick();
}

/// Registers the timer tick against [`crate::irq::TIMER_VECTOR`]. Part
/// of the `normal` initcall stage, run after `init` so `tick` always has
/// a live `current` thread to charge.
pub fn install_timer_handler() {
    crate::irq::set_handler(crate::irq::TIMER_VECTOR, timer_tick_handler, core::ptr::null_mut());
}

/// Adds a freshly created, already-RUNNING thread to the runqueue.
/// Called by `process::fork` and `process::spawn_kernel_thread` once
/// the new [`crate::process::Thread`] is in the arena.
pub fn enqueue_new_thread(tid: ThreadId) {
    if let Some(state) = STATE.lock().as_mut() {
        state.runqueue.push_back(tid);
    }
}

/// Moves a WAITING thread back to RUNNING and onto the runqueue. Used by
/// every wakeup path: [`crate::sync::Semaphore::release`] and
/// [`crate::process::waitpid`]'s wakers.
///
/// A no-op for any thread not currently WAITING — in particular a
/// ZOMBIE one. `kill` marks its victim's threads ZOMBIE directly rather
/// than calling this, but does not reach into every wait queue a killed
/// thread might be parked on to remove it; the stale entry is harmless
/// because whichever wait queue eventually dequeues it and calls this
/// finds it no longer WAITING and drops it instead of resurrecting it
/// onto the runqueue.
pub fn unblock(tid: ThreadId) {
    let was_waiting = process::with_thread_mut(tid, |t| {
        let was_waiting = t.state == ThreadState::Waiting;
        if was_waiting {
            t.state = ThreadState::Running;
        }
        was_waiting
    })
    .unwrap_or(false);
    if was_waiting {
        if let Some(state) = STATE.lock().as_mut() {
            state.runqueue.push_back(tid);
        }
    }
}

/// Marks the current thread WAITING and yields the CPU. The caller is
/// responsible for having already enqueued it on whatever wait queue it
/// is blocking on, and for holding no lock of its own — see the module
/// doc comment.
pub fn block_current() {
    let tid = state_current();
    process::with_thread_mut(tid, |t| t.state = ThreadState::Waiting);
    schedule();
}

/// Yields the CPU without changing the current thread's state: used by
/// cooperative callers (none yet in this crate, but kept symmetrical
/// with `block_current`/`terminate_current` as the third way a thread
/// ever leaves `current`).
pub fn yield_now() {
    schedule();
}

/// Suspends the current thread, per [`process::exit_current`] having
/// already marked it ZOMBIE, and never returns: nothing ever re-enqueues
/// a ZOMBIE thread, so its frozen `switch_to` call is never resumed.
pub fn terminate_current() -> ! {
    schedule();
    unreachable!("a terminated thread was resumed")
}

/// Picks the next thread to run and performs the handoff. A no-op if the
/// current thread is still the only runnable one.
///
/// Order of operations mirrors §4.7's context-switch steps: pick next,
/// release the scheduler's own bookkeeping lock, update `TSS.esp0`,
/// reload `CR3` only if the address space actually differs, then the raw
/// stack-pointer swap.
pub fn schedule() {
    let switch = {
        let mut guard = STATE.lock();
        let state = guard.as_mut().expect("scheduler not initialised");
        let old_tid = state.current;

        let old_runnable = process::with_thread(old_tid, |t| t.state == ThreadState::Running).unwrap_or(false);
        if old_runnable {
            state.runqueue.push_back(old_tid);
        }

        let mut next_tid = None;
        while let Some(candidate) = state.runqueue.pop_front() {
            let runnable = process::with_thread(candidate, |t| t.state == ThreadState::Running).unwrap_or(false);
            if runnable {
                next_tid = Some(candidate);
                break;
            }
            // A thread can end up here WAITING or ZOMBIE if it was
            // queued and then raced by `kill` before it ran again;
            // dropping it here (rather than resuming a dead stack) is
            // what keeps the RUNNING <=> queued-or-current invariant
            // self-healing instead of load-bearing everywhere else.
        }

        match next_tid {
            Some(next) if next != old_tid => {
                state.current = next;
                Some((old_tid, next))
            }
            Some(same) => {
                debug_assert_eq!(same, old_tid);
                None
            }
            None => None,
        }
    };

    let Some((old_tid, next_tid)) = switch else { return };

    let old_sp_ptr = process::thread_saved_sp_ptr(old_tid);
    let (next_sp, next_stack_top, next_pid) = process::with_thread(next_tid, |t| (t.saved_sp, t.kernel_stack_top, t.process))
        .expect("a thread popped from the runqueue a moment ago still exists");

    gdt::set_kernel_stack(next_stack_top);

    if let Some(pd_phys) = process::address_space_pd_phys(next_pid) {
        if pd_phys != mmu::current_pd_phys() {
            // SAFETY: `pd_phys` is `next_tid`'s own address space,
            // which maps the kernel half identically to every other
            // directory, so the code and stack executing this switch
            // remain mapped across the reload.
            unsafe { mmu::activate(pd_phys) };
        }
    }

    // SAFETY: `next_sp` is either a stack `switch_to` previously
    // suspended at, or one freshly built by
    // `context::new_kernel_thread_stack`/`new_user_thread_stack`, both of
    // which lay out exactly the shape `switch_to_asm`'s prologue expects.
    unsafe { context::switch_to(old_sp_ptr, next_sp) };
}

/// The thread every other thread eventually yields to when nothing else
/// is runnable. Spawned once from the `late` initcall stage.
extern "C" fn idle_entry(_arg: usize) -> ! {
    loop {
        port::halt();
    }
}

pub fn spawn_idle_thread() {
    process::spawn_kernel_thread(idle_entry, 0);
}
