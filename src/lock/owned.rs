//! Owned lock (§4.G "Owned lock"): a plain lock plus the identity of the
//! current holder, rejecting self-deadlock and release by a non-owner.

use core::time::Duration;

use interlock_rt::flag::Flag;

use crate::error::LockError;
use crate::semaphore::Semaphore;
use crate::task_id::{current_task_id, TaskId};

/// A lock that records its holder's [`TaskId`] (§4.B) and enforces owner
/// discipline (§8 property 6).
pub struct OwnedLock {
    semaphore: Semaphore,
    owner: Flag<TaskId>,
}

impl OwnedLock {
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
            owner: Flag::new(),
        }
    }

    /// Returns the current holder, if any. Racy; for introspection only.
    pub fn owner(&self) -> Option<TaskId> {
        self.owner.get()
    }

    fn check_not_self_owned(&self) -> Result<(), LockError> {
        if self.owner.get() == Some(current_task_id()) {
            Err(LockError::SelfDeadlock)
        } else {
            Ok(())
        }
    }

    fn claim(&self) {
        let claimed = self.owner.set(current_task_id());
        debug_assert!(claimed, "acquired the semaphore but the owner cell was occupied");
    }

    pub fn try_lock(&self) -> Result<bool, LockError> {
        self.check_not_self_owned()?;
        let acquired = self.semaphore.try_acquire();
        if acquired {
            self.claim();
        }
        Ok(acquired)
    }

    pub fn lock(&self) -> Result<(), LockError> {
        self.check_not_self_owned()?;
        self.semaphore.acquire();
        self.claim();
        Ok(())
    }

    pub fn lock_timeout(&self, timeout: Duration) -> Result<bool, LockError> {
        self.check_not_self_owned()?;
        let acquired = self.semaphore.acquire_timeout(timeout);
        if acquired {
            self.claim();
        }
        Ok(acquired)
    }

    pub async fn lock_async(&self) -> Result<(), LockError> {
        self.check_not_self_owned()?;
        self.semaphore.acquire_async().await;
        self.claim();
        Ok(())
    }

    /// Releases the lock. Fails with [`LockError::NotOwner`] if the calling
    /// task is not the current holder (which also covers "not locked at
    /// all", since the owner cell is then empty).
    pub fn unlock(&self) -> Result<(), LockError> {
        if self.owner.get() != Some(current_task_id()) {
            return Err(LockError::NotOwner);
        }
        self.owner.clear();
        self.semaphore.release(1);
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.semaphore.available() == 0
    }
}

impl Default for OwnedLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    #[test]
    fn self_deadlock_is_rejected() {
        let lock = OwnedLock::new();
        lock.lock().unwrap();
        assert_eq!(lock.try_lock(), Err(LockError::SelfDeadlock));
    }

    #[test]
    fn release_by_non_owner_is_rejected() {
        let lock = OwnedLock::new();
        assert_eq!(lock.unlock(), Err(LockError::NotOwner));
    }

    #[test]
    fn owner_tracks_holder_across_threads() {
        let lock = std::sync::Arc::new(OwnedLock::new());
        lock.lock().unwrap();
        let held_by_other_thread = {
            let lock = lock.clone();
            std::thread::spawn(move || lock.unlock())
                .join()
                .unwrap()
        };
        // The spawned thread is a different task identity, so it is not
        // the owner and its unlock is rejected.
        assert_eq!(held_by_other_thread, Err(LockError::NotOwner));
        assert_eq!(lock.unlock(), Ok(()));
    }
}
