//! IRQ-safe spinlock: a single atomic flag plus the save/restore of the
//! caller's interrupt-enable state, so a lock can be taken from both
//! ordinary kernel code and (via [`SpinLock::lock`], never from a
//! handler that is itself holding the same lock) an interrupt handler
//! without the classic single-CPU self-deadlock.
//!
//! The atomic test-and-set itself is [`spin::Mutex`]'s; this type's only
//! job is wrapping it with the interrupt discipline §4.8 and §5 require.

use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use crate::arch::x86::port::{restore_interrupts, save_and_disable_interrupts};

/// A spinlock that disables interrupts for the duration it is held.
pub struct SpinLock<T> {
    inner: Mutex<T>,
}

/// RAII guard: restores the caller's interrupt-enable state on drop,
/// after releasing the underlying lock.
pub struct SpinLockGuard<'a, T> {
    guard: Option<MutexGuard<'a, T>>,
    was_enabled: bool,
}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self { inner: Mutex::new(value) }
    }

    /// Disables interrupts, busy-waits for the lock, and returns a guard
    /// that restores the prior interrupt state when dropped.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let was_enabled = save_and_disable_interrupts();
        SpinLockGuard {
            guard: Some(self.inner.lock()),
            was_enabled,
        }
    }

    /// Non-blocking variant of [`SpinLock::lock`].
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let was_enabled = save_and_disable_interrupts();
        match self.inner.try_lock() {
            Some(guard) => Some(SpinLockGuard {
                guard: Some(guard),
                was_enabled,
            }),
            None => {
                restore_interrupts(was_enabled);
                None
            }
        }
    }

    /// Direct access bypassing the lock, for use only where the caller
    /// can prove exclusivity some other way (e.g. single-threaded boot
    /// before any other thread exists).
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.guard.as_ref().unwrap()
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().unwrap()
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        // Drop the inner guard (releases the test-and-set flag) before
        // possibly re-enabling interrupts, matching "release is a
        // single clear" followed by restoring the caller's IF.
        self.guard = None;
        restore_interrupts(self.was_enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn mutual_exclusion_round_trips_the_value() {
        let lock = SpinLock::new(0u32);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }

    #[test_case]
    fn try_lock_fails_while_held() {
        let lock = SpinLock::new(());
        let _first = lock.lock();
        assert!(lock.try_lock().is_none());
    }
}
