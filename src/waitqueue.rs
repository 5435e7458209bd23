//! The thread-safe waiter sequence every F-L primitive shares (§5: "a
//! thread-safe unbounded sequence with append, popleft, remove").
//!
//! [`interlock_rt::utils::ListQueue`] was considered and ruled out — it has
//! no arbitrary removal-by-value, which the semaphore core's cancellation
//! path (§4.F step 6) needs to vacate a cancelled waiter's slot. A plain
//! `Mutex`-guarded `VecDeque` gives us that directly, at the cost of a lock
//! instead of a lock-free structure; §9's "busy-wait concerns" note
//! explicitly sanctions a proper mutex for the hottest primitives over the
//! lock-free token-cell idiom, and every primitive built on this queue
//! counts as "hottest" by that note's own examples (Queue, Barrier).

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use interlock_rt::sync::Mutex;
use interlock_task::waiter::Waiter;

/// An ordered, thread-safe sequence of pending [`Waiter`]s.
pub struct WaitQueue {
    inner: Mutex<VecDeque<Arc<Waiter>>>,
}

impl WaitQueue {
    /// Creates an empty queue.
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends `waiter` at the back.
    pub fn push_back(&self, waiter: Arc<Waiter>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(waiter);
    }

    /// Removes and returns the waiter at the front, if any.
    pub fn pop_front(&self) -> Option<Arc<Waiter>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Removes `waiter` wherever it sits in the sequence, by pointer
    /// identity. Returns `true` if it was present and removed.
    ///
    /// Used by a cancelling acquirer (§4.F step 6) to vacate its own slot;
    /// if this returns `false`, a releaser already popped the waiter
    /// concurrently and the caller must treat the in-flight wake as
    /// authoritative instead.
    pub fn remove(&self, waiter: &Arc<Waiter>) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = guard
            .iter()
            .position(|candidate| Arc::ptr_eq(candidate, waiter))
        {
            guard.remove(index);
            true
        } else {
            false
        }
    }

    /// Returns `true` if the queue currently holds no waiters.
    ///
    /// Racy by nature (another thread may push/pop concurrently); used only
    /// for introspection (e.g. a barrier's `waiting` counter), never to
    /// gate correctness decisions.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    /// Returns the number of waiters currently enqueued. Same raciness
    /// caveat as [`WaitQueue::is_empty`].
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for WaitQueue {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let queue = WaitQueue::new();
        let a = Arc::new(Waiter::green(false));
        let b = Arc::new(Waiter::green(false));
        queue.push_back(a.clone());
        queue.push_back(b.clone());

        let first = queue.pop_front().unwrap();
        assert!(Arc::ptr_eq(&first, &a));
        let second = queue.pop_front().unwrap();
        assert!(Arc::ptr_eq(&second, &b));
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn remove_by_identity() {
        let queue = WaitQueue::new();
        let a = Arc::new(Waiter::green(false));
        let b = Arc::new(Waiter::green(false));
        queue.push_back(a.clone());
        queue.push_back(b.clone());

        assert!(queue.remove(&a));
        assert!(!queue.remove(&a));
        assert_eq!(queue.len(), 1);

        let remaining = queue.pop_front().unwrap();
        assert!(Arc::ptr_eq(&remaining, &b));
    }
}
