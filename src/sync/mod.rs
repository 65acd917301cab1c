//! Synchronisation primitives: spinlock, wait queue, semaphore (§4.8).
//!
//! These three build on each other in one direction only: [`WaitQueue`]
//! is a FIFO guarded by a [`SpinLock`]; [`Semaphore`] is a counter plus a
//! `WaitQueue` guarded by its own `SpinLock`. None of them ever suspend
//! while holding a lock they did not hand off first — the design note's
//! "no locks across suspension except the scheduler lock" rule — so
//! every blocking path here releases its own lock before calling into
//! [`crate::sched`].

pub mod semaphore;
pub mod spinlock;
pub mod wait_queue;

pub use semaphore::Semaphore;
pub use spinlock::SpinLock;
pub use wait_queue::WaitQueue;
