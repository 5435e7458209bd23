//! Capacity limiter (component H, §4.H): a semaphore wrapper that maps
//! each borrowed token to the identity of the task holding it.
//!
//! Resolves Open Question 3 (§9) by keeping both variants the source
//! carries — reentrant (a task may borrow more than one token, tracked by
//! recursion level) and non-reentrant (a second borrow by the same task is
//! rejected) — as one generic type parameterized by a zero-sized
//! [`Mode`] marker rather than deprecating either.

use alloc::vec::Vec;
use core::marker::PhantomData;
use core::time::Duration;

use interlock_rt::sync::Mutex;

use crate::error::LimiterError;
use crate::semaphore::Semaphore;
use crate::task_id::{current_task_id, TaskId};

mod sealed {
    pub trait Sealed {}
}

/// Selects [`CapacityLimiter`]'s re-entrancy policy.
pub trait Mode: sealed::Sealed + Default {
    #[doc(hidden)]
    const REENTRANT: bool;
}

/// A task may borrow more than one token, tracked by recursion level.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reentrant;

/// A second borrow by the same task while it already holds one is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Borrow;

impl sealed::Sealed for Reentrant {}
impl sealed::Sealed for Borrow {}
impl Mode for Reentrant {
    const REENTRANT: bool = true;
}
impl Mode for Borrow {
    const REENTRANT: bool = false;
}

/// Per-task accounting on top of a semaphore (§4.H).
///
/// `M` defaults to [`Borrow`] (non-reentrant), matching the common case of
/// "N tasks may each hold one token at a time"; use
/// `CapacityLimiter<Reentrant>` for a task that may hold several.
pub struct CapacityLimiter<M: Mode = Borrow> {
    semaphore: Semaphore,
    total: usize,
    borrowers: Mutex<Vec<(TaskId, usize)>>,
    _mode: PhantomData<M>,
}

impl<M: Mode> CapacityLimiter<M> {
    pub fn new(total_tokens: usize) -> Self {
        Self {
            semaphore: Semaphore::new(total_tokens),
            total: total_tokens,
            borrowers: Mutex::new(Vec::new()),
            _mode: PhantomData,
        }
    }

    #[inline]
    pub fn total_tokens(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn available_tokens(&self) -> usize {
        self.semaphore.available()
    }

    #[inline]
    pub fn borrowed_tokens(&self) -> usize {
        self.total - self.available_tokens()
    }

    /// Snapshot of the current borrowers map: `(task, recursion level)`.
    pub fn borrowers(&self) -> Vec<(TaskId, usize)> {
        self.borrowers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn register_reentry(&self) -> Result<bool, LimiterError> {
        let task = current_task_id();
        let mut guard = self.borrowers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = guard.iter_mut().find(|(t, _)| *t == task) {
            if M::REENTRANT {
                entry.1 += 1;
                return Ok(true);
            }
            return Err(LimiterError::Reentered);
        }
        Ok(false)
    }

    fn register_new_borrow(&self) {
        let task = current_task_id();
        let mut guard = self.borrowers.lock().unwrap_or_else(|e| e.into_inner());
        guard.push((task, 1));
        #[cfg(feature = "tracing")]
        tracing::trace!(?task, borrowed = guard.len(), "capacity limiter token borrowed");
    }

    /// Attempts to borrow one token without blocking.
    pub fn try_acquire(&self) -> Result<bool, LimiterError> {
        if self.register_reentry()? {
            return Ok(true);
        }
        let acquired = self.semaphore.try_acquire();
        if acquired {
            self.register_new_borrow();
        }
        Ok(acquired)
    }

    /// Blocks the calling OS thread until a token is borrowed.
    pub fn acquire(&self) -> Result<(), LimiterError> {
        if self.register_reentry()? {
            return Ok(());
        }
        self.semaphore.acquire();
        self.register_new_borrow();
        Ok(())
    }

    pub fn acquire_timeout(&self, timeout: Duration) -> Result<bool, LimiterError> {
        if self.register_reentry()? {
            return Ok(true);
        }
        let acquired = self.semaphore.acquire_timeout(timeout);
        if acquired {
            self.register_new_borrow();
        }
        Ok(acquired)
    }

    pub async fn acquire_async(&self) -> Result<(), LimiterError> {
        if self.register_reentry()? {
            return Ok(());
        }
        self.semaphore.acquire_async().await;
        self.register_new_borrow();
        Ok(())
    }

    /// Returns one borrowed token. Errors if the calling task holds none.
    pub fn release(&self) -> Result<(), LimiterError> {
        let task = current_task_id();
        let mut guard = self.borrowers.lock().unwrap_or_else(|e| e.into_inner());
        let index = guard
            .iter()
            .position(|(t, _)| *t == task)
            .ok_or(LimiterError::NotBorrowed)?;

        let vacate = {
            let entry = &mut guard[index];
            entry.1 -= 1;
            entry.1 == 0
        };
        if vacate {
            guard.remove(index);
        }
        drop(guard);

        #[cfg(feature = "tracing")]
        tracing::trace!(?task, vacated = vacate, "capacity limiter token returned");

        if vacate {
            self.semaphore.release(1);
        }
        Ok(())
    }
}

impl<M: Mode> Default for CapacityLimiter<M> {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    #[test]
    fn non_reentrant_rejects_second_borrow_same_task() {
        let limiter: CapacityLimiter<Borrow> = CapacityLimiter::new(2);
        assert_eq!(limiter.try_acquire(), Ok(true));
        assert_eq!(limiter.try_acquire(), Err(LimiterError::Reentered));
    }

    #[test]
    fn reentrant_allows_nested_borrow_and_balances_release() {
        let limiter: CapacityLimiter<Reentrant> = CapacityLimiter::new(2);
        assert_eq!(limiter.try_acquire(), Ok(true));
        assert_eq!(limiter.try_acquire(), Ok(true));
        assert_eq!(limiter.borrowed_tokens(), 1);
        limiter.release().unwrap();
        assert_eq!(limiter.borrowed_tokens(), 1);
        limiter.release().unwrap();
        assert_eq!(limiter.borrowed_tokens(), 0);
    }

    #[test]
    fn release_without_borrow_is_rejected() {
        let limiter: CapacityLimiter<Borrow> = CapacityLimiter::new(1);
        assert_eq!(limiter.release(), Err(LimiterError::NotBorrowed));
    }

    #[test]
    fn introspection_reflects_borrowed_count() {
        let limiter: CapacityLimiter<Borrow> = CapacityLimiter::new(3);
        assert_eq!(limiter.total_tokens(), 3);
        assert!(limiter.try_acquire().unwrap());
        assert_eq!(limiter.available_tokens(), 2);
        assert_eq!(limiter.borrowed_tokens(), 1);
        assert_eq!(limiter.borrowers().len(), 1);
    }
}
