//! FIFO of parked threads (§3, §4.8). A wait queue never touches thread
//! state itself beyond recording membership; [`crate::sched`] is the
//! only code that flips a thread between RUNNING and WAITING, so the
//! invariant "WAITING iff on exactly one wait queue" has a single
//! writer.

use alloc::collections::VecDeque;

use crate::process::ThreadId;
use crate::sync::spinlock::SpinLock;

pub struct WaitQueue {
    waiters: SpinLock<VecDeque<ThreadId>>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { waiters: SpinLock::new(VecDeque::new()) }
    }

    /// Appends `tid` to the tail. Caller is responsible for then marking
    /// the thread WAITING and calling [`crate::sched::block_current`] —
    /// splitting the two steps is what lets [`crate::sync::Semaphore`]
    /// release its own lock before suspending.
    pub fn enqueue(&self, tid: ThreadId) {
        self.waiters.lock().push_back(tid);
    }

    /// Removes and returns the head of the queue, if any.
    pub fn dequeue(&self) -> Option<ThreadId> {
        self.waiters.lock().pop_front()
    }

    /// Removes a specific thread from the queue, for cancellation paths.
    /// Returns whether it was present.
    pub fn remove(&self, tid: ThreadId) -> bool {
        let mut waiters = self.waiters.lock();
        if let Some(pos) = waiters.iter().position(|&t| t == tid) {
            waiters.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn fifo_order_is_preserved() {
        let q = WaitQueue::new();
        q.enqueue(ThreadId(1));
        q.enqueue(ThreadId(2));
        q.enqueue(ThreadId(3));
        assert_eq!(q.dequeue(), Some(ThreadId(1)));
        assert_eq!(q.dequeue(), Some(ThreadId(2)));
        assert_eq!(q.dequeue(), Some(ThreadId(3)));
        assert_eq!(q.dequeue(), None);
    }

    #[test_case]
    fn remove_drops_a_specific_waiter() {
        let q = WaitQueue::new();
        q.enqueue(ThreadId(1));
        q.enqueue(ThreadId(2));
        assert!(q.remove(ThreadId(1)));
        assert_eq!(q.dequeue(), Some(ThreadId(2)));
    }
}
