//! Bounded lock (§4.G "Bounded lock"): like [`Lock`](crate::lock::Lock),
//! but releasing a lock that isn't held is rejected rather than silently
//! over-supplying a token.

use core::time::Duration;

use crate::error::LockError;
use crate::semaphore::BoundedSemaphore;

/// A lock that rejects release-without-acquire (§7 "Contract violation").
pub struct BoundedLock {
    semaphore: BoundedSemaphore,
}

impl BoundedLock {
    pub fn new() -> Self {
        Self {
            semaphore: BoundedSemaphore::new(1),
        }
    }

    pub fn try_lock(&self) -> bool {
        self.semaphore.try_acquire()
    }

    pub fn lock(&self) -> bool {
        self.semaphore.acquire()
    }

    pub fn lock_timeout(&self, timeout: Duration) -> bool {
        self.semaphore.acquire_timeout(timeout)
    }

    pub async fn lock_async(&self) -> bool {
        self.semaphore.acquire_async().await
    }

    /// Releases the lock. Fails with [`LockError::NotLocked`] if the lock
    /// was not currently held.
    pub fn unlock(&self) -> Result<(), LockError> {
        if self.semaphore.release(1) {
            Ok(())
        } else {
            Err(LockError::NotLocked)
        }
    }

    pub fn is_locked(&self) -> bool {
        self.semaphore.available() == 0
    }
}

impl Default for BoundedLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    #[test]
    fn unlock_without_lock_is_rejected() {
        let lock = BoundedLock::new();
        assert_eq!(lock.unlock(), Err(LockError::NotLocked));
    }

    #[test]
    fn lock_then_unlock_then_reject_double_unlock() {
        let lock = BoundedLock::new();
        assert!(lock.try_lock());
        assert_eq!(lock.unlock(), Ok(()));
        assert_eq!(lock.unlock(), Err(LockError::NotLocked));
    }
}
