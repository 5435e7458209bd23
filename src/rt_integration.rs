//! Lock abstraction (§9 "duck typing → interface abstraction"): the traits
//! [`Condition`](crate::condition::Condition) is generic over, plus the
//! implementations that let this crate's own lock family (`Lock`, `RLock`)
//! play that role.
//!
//! The source lets any object exposing `acquire`/`release` participate as a
//! condition variable's lock, relying on duck typing. Rust has no duck
//! typing, so the same boundary becomes an explicit trait here: a type
//! implements [`SyncLock`]/[`AsyncLock`] (and, if it wants to compose with
//! `Condition::wait`, [`SaveRestore`]) and is usable with `Condition<L>`
//! without `Condition` ever naming `Lock` or `RLock` directly.

use core::time::Duration;

use crate::lock::{Lock, RLock, SavedState};

/// A lock usable from blocking (green) code.
pub trait SyncLock {
    /// Blocks the calling OS thread until the lock is acquired.
    fn lock(&self);
    /// Like [`SyncLock::lock`], giving up after `timeout`.
    fn lock_timeout(&self, timeout: Duration) -> bool;
    /// Releases the lock.
    fn unlock(&self);
}

/// A lock usable from async code.
pub trait AsyncLock {
    /// Suspends the calling task until the lock is acquired.
    async fn lock_async(&self);
    /// Releases the lock.
    fn unlock_async(&self);
}

/// A lock whose acquisition can be fully released and later restored,
/// preserving whatever ownership/recursion state it carried (§4.G
/// `release_save`/`acquire_restore`, §4.K) — what
/// [`Condition::wait`](crate::condition::Condition::wait) needs around a
/// wait so the lock is available to other tasks while this one is
/// suspended, then comes back exactly as it was.
pub trait SaveRestore: SyncLock + AsyncLock {
    /// Opaque state produced by [`SaveRestore::release_save`] and consumed
    /// by [`SaveRestore::acquire_restore`]/[`SaveRestore::acquire_restore_async`].
    type Saved;

    /// Fully releases the lock, returning the state needed to restore it.
    ///
    /// Panics if the calling task does not currently hold the lock — a
    /// contract violation identical to calling `Condition::wait` without
    /// holding the lock in the first place (§4.K).
    fn release_save(&self) -> Self::Saved;

    /// Re-acquires the lock, blocking the calling OS thread, and restores
    /// the state captured by [`SaveRestore::release_save`].
    fn acquire_restore(&self, saved: Self::Saved);

    /// Async counterpart to [`SaveRestore::acquire_restore`].
    async fn acquire_restore_async(&self, saved: Self::Saved);
}

impl SyncLock for Lock {
    fn lock(&self) {
        Lock::lock(self);
    }

    fn lock_timeout(&self, timeout: Duration) -> bool {
        Lock::lock_timeout(self, timeout)
    }

    fn unlock(&self) {
        Lock::unlock(self);
    }
}

impl AsyncLock for Lock {
    async fn lock_async(&self) {
        Lock::lock_async(self).await;
    }

    fn unlock_async(&self) {
        Lock::unlock(self);
    }
}

impl SaveRestore for Lock {
    type Saved = ();

    fn release_save(&self) -> Self::Saved {
        Lock::unlock(self);
    }

    fn acquire_restore(&self, _saved: Self::Saved) {
        Lock::lock(self);
    }

    async fn acquire_restore_async(&self, _saved: Self::Saved) {
        Lock::lock_async(self).await;
    }
}

impl SyncLock for RLock {
    fn lock(&self) {
        RLock::lock(self);
    }

    fn lock_timeout(&self, timeout: Duration) -> bool {
        RLock::lock_timeout(self, timeout)
    }

    fn unlock(&self) {
        RLock::unlock(self)
            .expect("RLock::unlock called by a task that does not hold the lock");
    }
}

impl AsyncLock for RLock {
    async fn lock_async(&self) {
        RLock::lock_async(self).await;
    }

    fn unlock_async(&self) {
        RLock::unlock(self)
            .expect("RLock::unlock called by a task that does not hold the lock");
    }
}

impl SaveRestore for RLock {
    type Saved = SavedState;

    fn release_save(&self) -> Self::Saved {
        RLock::release_save(self)
            .expect("Condition::wait requires the calling task to hold the lock")
    }

    fn acquire_restore(&self, saved: Self::Saved) {
        RLock::acquire_restore(self, saved);
    }

    async fn acquire_restore_async(&self, saved: Self::Saved) {
        RLock::acquire_restore_async(self, saved).await;
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    fn assert_sync_lock<L: SyncLock>() {}
    fn assert_async_lock<L: AsyncLock>() {}
    fn assert_save_restore<L: SaveRestore>() {}

    #[test]
    fn lock_satisfies_all_three_traits() {
        assert_sync_lock::<Lock>();
        assert_async_lock::<Lock>();
        assert_save_restore::<Lock>();
    }

    #[test]
    fn rlock_satisfies_all_three_traits() {
        assert_sync_lock::<RLock>();
        assert_async_lock::<RLock>();
        assert_save_restore::<RLock>();
    }

    #[test]
    fn lock_round_trips_through_trait_methods() {
        let lock = Lock::new();
        SyncLock::lock(&lock);
        let saved = SaveRestore::release_save(&lock);
        assert!(lock.try_lock());
        SyncLock::unlock(&lock);
        SaveRestore::acquire_restore(&lock, saved);
        SyncLock::unlock(&lock);
    }
}
