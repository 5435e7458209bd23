//! Reentrant lock (§4.G "Reentrant lock"): owner cell plus a recursion
//! level, with `release_save`/`acquire_restore` for condition-variable
//! cooperation (§4.K).

use core::time::Duration;

use interlock_rt::flag::Flag;
use interlock_rt::sync::atomic::{AtomicUsize, Ordering};

use crate::checkpoint::{self, Fairness};
use crate::error::LockError;
use crate::semaphore::Semaphore;
use crate::task_id::{current_task_id, TaskId};

/// Saved ownership state produced by [`RLock::release_save`] and consumed
/// by [`RLock::acquire_restore`].
pub struct SavedState {
    owner: TaskId,
    level: usize,
}

/// A mutex that may be acquired more than once by its owner (`RLock`).
///
/// Invariant: `owner == None ⇔ level == 0` (§3 "Lock state").
pub struct RLock {
    semaphore: Semaphore,
    owner: Flag<TaskId>,
    level: AtomicUsize,
}

impl RLock {
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
            owner: Flag::new(),
            level: AtomicUsize::new(0),
        }
    }

    pub fn owner(&self) -> Option<TaskId> {
        self.owner.get()
    }

    /// Current recursion level (0 when unheld).
    pub fn level(&self) -> usize {
        self.level.load(Ordering::Acquire)
    }

    fn owned_by_caller(&self) -> bool {
        self.owner.get() == Some(current_task_id())
    }

    /// Acquires `count` levels at once. If the caller already owns the
    /// lock this is a cheap increment (no blocking); otherwise it acquires
    /// the underlying semaphore first.
    pub fn lock_n(&self, count: usize) {
        if self.owned_by_caller() {
            self.level.fetch_add(count, Ordering::AcqRel);
            checkpoint::checkpoint(Fairness::Configured);
            return;
        }
        self.semaphore.acquire();
        self.claim(count);
    }

    pub fn lock(&self) {
        self.lock_n(1);
    }

    pub async fn lock_async_n(&self, count: usize) {
        if self.owned_by_caller() {
            self.level.fetch_add(count, Ordering::AcqRel);
            checkpoint::checkpoint_async(Fairness::Configured).await;
            return;
        }
        self.semaphore.acquire_async().await;
        self.claim(count);
    }

    pub async fn lock_async(&self) {
        self.lock_async_n(1).await;
    }

    pub fn try_lock(&self) -> bool {
        if self.owned_by_caller() {
            self.level.fetch_add(1, Ordering::AcqRel);
            return true;
        }
        if self.semaphore.try_acquire() {
            self.claim(1);
            true
        } else {
            false
        }
    }

    pub fn lock_timeout(&self, timeout: Duration) -> bool {
        if self.owned_by_caller() {
            self.level.fetch_add(1, Ordering::AcqRel);
            return true;
        }
        if self.semaphore.acquire_timeout(timeout) {
            self.claim(1);
            true
        } else {
            false
        }
    }

    fn claim(&self, count: usize) {
        let claimed = self.owner.set(current_task_id());
        debug_assert!(claimed, "acquired the semaphore but the owner cell was occupied");
        self.level.store(count, Ordering::Release);
    }

    /// Releases `count` levels. At zero, vacates ownership and releases the
    /// underlying semaphore.
    pub fn unlock_n(&self, count: usize) -> Result<(), LockError> {
        if !self.owned_by_caller() {
            return Err(LockError::NotOwner);
        }
        let held = self.level.load(Ordering::Acquire);
        if count > held {
            return Err(LockError::CountExceedsLevel {
                requested: count,
                held,
            });
        }
        let remaining = held - count;
        self.level.store(remaining, Ordering::Release);
        if remaining == 0 {
            self.owner.clear();
            self.semaphore.release(1);
        }
        Ok(())
    }

    pub fn unlock(&self) -> Result<(), LockError> {
        self.unlock_n(1)
    }

    /// Fully vacates the lock regardless of its current level, returning
    /// the state needed to restore it later. Used by
    /// [`Condition`](crate::condition::Condition) around a wait so the
    /// lock is released (and the next waiter can acquire it) while this
    /// task is suspended.
    pub fn release_save(&self) -> Result<SavedState, LockError> {
        if !self.owned_by_caller() {
            return Err(LockError::NotOwner);
        }
        let owner = self.owner.get().expect("checked owned_by_caller above");
        let level = self.level.swap(0, Ordering::AcqRel);
        self.owner.clear();
        self.semaphore.release(1);
        Ok(SavedState { owner, level })
    }

    /// Re-acquires the lock and restores the recursion level captured by
    /// [`RLock::release_save`].
    pub fn acquire_restore(&self, state: SavedState) {
        self.semaphore.acquire();
        let claimed = self.owner.set(state.owner);
        debug_assert!(claimed, "re-acquired the semaphore but the owner cell was occupied");
        self.level.store(state.level, Ordering::Release);
    }

    /// Async counterpart to [`RLock::acquire_restore`], suspending the
    /// calling task instead of blocking its thread.
    pub async fn acquire_restore_async(&self, state: SavedState) {
        self.semaphore.acquire_async().await;
        let claimed = self.owner.set(state.owner);
        debug_assert!(claimed, "re-acquired the semaphore but the owner cell was occupied");
        self.level.store(state.level, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.level() > 0
    }
}

impl Default for RLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    #[test]
    fn reentrant_acquire_increments_level() {
        let lock = RLock::new();
        lock.lock();
        lock.lock();
        assert_eq!(lock.level(), 2);
        lock.unlock().unwrap();
        assert_eq!(lock.level(), 1);
        lock.unlock().unwrap();
        assert_eq!(lock.level(), 0);
    }

    #[test]
    fn release_by_non_owner_rejected() {
        let lock = RLock::new();
        lock.lock();
        assert_eq!(lock.unlock_n(5), Err(LockError::CountExceedsLevel { requested: 5, held: 1 }));
    }

    #[test]
    fn save_and_restore_round_trips_level() {
        let lock = RLock::new();
        lock.lock();
        lock.lock();
        let saved = lock.release_save().unwrap();
        assert_eq!(lock.level(), 0);
        lock.acquire_restore(saved);
        assert_eq!(lock.level(), 2);
    }
}
