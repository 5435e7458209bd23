//! Plain lock (§4.G "Plain lock"): a bare semaphore with `initial = 1`, no
//! owner tracking. Both the sync and async flavors share one semaphore.

use core::time::Duration;

use crate::semaphore::Semaphore;

/// The simplest mutual-exclusion primitive: no owner bookkeeping, so any
/// task may release it, held or not — callers that need owner discipline
/// want [`OwnedLock`](crate::lock::OwnedLock) instead.
pub struct Lock {
    semaphore: Semaphore,
}

impl Lock {
    /// Creates an unlocked `Lock`.
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
        }
    }

    /// Attempts to lock without blocking.
    pub fn try_lock(&self) -> bool {
        self.semaphore.try_acquire()
    }

    /// Blocks the calling OS thread until the lock is acquired.
    pub fn lock(&self) -> bool {
        self.semaphore.acquire()
    }

    /// Like [`Lock::lock`], giving up after `timeout`.
    pub fn lock_timeout(&self, timeout: Duration) -> bool {
        self.semaphore.acquire_timeout(timeout)
    }

    /// Suspends the calling task until the lock is acquired.
    pub async fn lock_async(&self) -> bool {
        self.semaphore.acquire_async().await
    }

    /// Releases the lock. Since this flavor tracks no owner, calling this
    /// without holding the lock simply over-supplies a token to the next
    /// acquirer — callers that need that misuse rejected want
    /// [`BoundedLock`](crate::lock::BoundedLock).
    pub fn unlock(&self) {
        self.semaphore.release(1);
    }

    /// Returns `true` if the lock currently looks unheld. Racy; for
    /// introspection/debug assertions only.
    pub fn is_locked(&self) -> bool {
        self.semaphore.available() == 0
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    #[test]
    fn mutual_exclusion() {
        let lock = Lock::new();
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        lock.unlock();
        assert!(lock.try_lock());
    }

    #[test]
    fn async_lock_resolves() {
        let lock = Lock::new();
        assert!(interlock_task::block_on(lock.lock_async()));
    }

    #[test]
    fn s1_lock_handoff_from_thread_to_async_task() {
        // Scenario S1: an OS thread holds the lock while an async task
        // (its own event loop, on a different OS thread) is blocked trying
        // to acquire it; the thread's release must wake the task.
        use alloc::sync::Arc as StdArc;

        let lock = StdArc::new(Lock::new());
        assert!(lock.lock());

        let lock2 = lock.clone();
        let async_task = std::thread::spawn(move || {
            interlock_task::block_on(lock2.lock_async())
        });

        std::thread::sleep(Duration::from_millis(10));
        lock.unlock();

        assert!(async_task.join().unwrap());
        assert!(lock.is_locked());
    }
}
