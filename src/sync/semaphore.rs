//! Counting semaphore (§3, §4.8): spinlock-guarded counter plus a wait
//! queue. `acquire`/`release` implement ownership-transfer wakeup —
//! releasing into a non-empty wait queue hands the slot directly to the
//! woken thread rather than incrementing the counter for it to
//! immediately re-decrement, matching the invariant
//! `count > 0 => wait_queue is empty`.

use crate::process::ThreadId;
use crate::sync::spinlock::SpinLock;
use crate::sync::wait_queue::WaitQueue;

struct State {
    count: u32,
}

pub struct Semaphore {
    state: SpinLock<State>,
    waiters: WaitQueue,
}

impl Semaphore {
    pub const fn new(initial: u32) -> Self {
        Self {
            state: SpinLock::new(State { count: initial }),
            waiters: WaitQueue::new(),
        }
    }

    /// A mutex is a semaphore initialised with count 1.
    pub const fn new_mutex() -> Self {
        Self::new(1)
    }

    /// Blocks the current thread until a unit is available.
    pub fn acquire(&self) {
        let mut state = self.state.lock();
        if state.count > 0 {
            state.count -= 1;
            return;
        }
        let tid = crate::sched::current_thread_id();
        self.waiters.enqueue(tid);
        // Release our own lock before suspending: a blocking primitive
        // must not hold any lock across `schedule()` besides the
        // scheduler lock itself.
        drop(state);
        crate::sched::block_current();
    }

    /// Non-blocking variant; returns whether a unit was acquired.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.count > 0 {
            state.count -= 1;
            true
        } else {
            false
        }
    }

    /// Releases a unit. If a thread is waiting, ownership transfers
    /// directly to it (the counter stays at zero); otherwise the
    /// counter is incremented.
    pub fn release(&self) {
        let mut state = self.state.lock();
        if let Some(tid) = self.waiters.dequeue() {
            drop(state);
            crate::sched::unblock(tid);
            return;
        }
        state.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.state.lock().count
    }

    pub fn has_waiters(&self) -> bool {
        !self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn try_acquire_respects_the_counter() {
        let sem = Semaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert_eq!(sem.count(), 1);
    }

    #[test_case]
    fn release_with_no_waiters_increments_count() {
        let sem = Semaphore::new(0);
        sem.release();
        assert_eq!(sem.count(), 1);
    }
}
