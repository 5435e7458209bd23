//! Semaphore core (component F, §4.F): the unified counting semaphore every
//! other blocking primitive in this crate is built from.
//!
//! Tokens are represented as a plain counter (`AtomicUsize`) rather than the
//! source's literal sequence of token objects — an integer is the
//! idiomatic Rust representation of "N interchangeable permits" and
//! satisfies the same invariant (a release never loses a token) without the
//! indirection of a real token collection.
//!
//! Fairness under contention is "barging allowed" by default: any caller
//! may grab a just-released token via [`Semaphore::try_acquire`] even while
//! other callers are already queued, which is fast and correct (no caller
//! starves forever, since `release` always drains the queue before
//! replenishing `available`) but not strictly FIFO under heavy contention.
//! [`crate::config::Config::perfect_fairness`] disables barging while any
//! waiter is queued, approximating §4.F's "reserve the head slot" strict
//! mode — see this module's `DESIGN.md` entry for why this is an
//! approximation rather than a hard guarantee.

use core::sync::atomic::Ordering;
use core::time::Duration;

use alloc::sync::Arc;

use interlock_rt::sync::atomic::AtomicUsize;
use interlock_task::waiter::Waiter;

use crate::checkpoint::{self, Fairness};
use crate::config;
use crate::waitqueue::WaitQueue;

/// A counting semaphore shared between OS threads and async tasks (§4.F).
pub struct Semaphore {
    available: AtomicUsize,
    waiters: WaitQueue,
    initial: usize,
}

impl Semaphore {
    /// Creates a semaphore starting with `initial` tokens available.
    pub fn new(initial: usize) -> Self {
        Self {
            available: AtomicUsize::new(initial),
            waiters: WaitQueue::new(),
            initial,
        }
    }

    /// The value this semaphore was constructed with (for introspection and
    /// recreation, §4.F).
    #[inline]
    pub fn initial(&self) -> usize {
        self.initial
    }

    /// Current number of immediately available tokens. Racy by nature; for
    /// introspection only.
    #[inline]
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    /// Attempts to take one token without blocking. Returns `true` iff a
    /// token was taken.
    pub fn try_acquire(&self) -> bool {
        if config::current().perfect_fairness && !self.waiters.is_empty() {
            return false;
        }
        self.try_take_token()
    }

    fn try_take_token(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
                value.checked_sub(1)
            })
            .is_ok()
    }

    /// Blocks the calling OS thread until a token is available. Always
    /// eventually returns `true` (no timeout).
    pub fn acquire(&self) -> bool {
        self.acquire_blocking(None)
    }

    /// Like [`Semaphore::acquire`], giving up after `timeout` elapses.
    ///
    /// Returns `true` if a token was taken, `false` on timeout. A timeout
    /// that raced with a concurrent wake (the releaser reached this waiter
    /// first) reports success instead (§5 "Cancellation & timeouts").
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        self.acquire_blocking(Some(timeout))
    }

    fn acquire_blocking(&self, timeout: Option<Duration>) -> bool {
        if self.try_acquire() {
            checkpoint::checkpoint(Fairness::Configured);
            return true;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(available = self.available(), "semaphore contended, parking thread");

        let waiter = Arc::new(Waiter::green(false));
        self.waiters.push_back(waiter.clone());

        // Re-attempt after enqueue: closes the acquire-after-release race
        // (§4.F step 4). If we got a token this way, mark the waiter
        // resolved so a concurrent `release` skips it instead of handing
        // it a second, now-orphaned token.
        if self.try_take_token() {
            waiter.wake();
            return true;
        }

        let woken = match timeout {
            Some(duration) => waiter.wait_timeout(duration),
            None => waiter.wait(),
        };

        if woken {
            return true;
        }

        if waiter.cancel() {
            self.waiters.remove(&waiter);
            false
        } else {
            // Lost the race: a release woke us between our timeout firing
            // and our cancel attempt. We hold a token; report success.
            true
        }
    }

    /// Suspends the calling task until a token is available. Cancellation
    /// is external (the future is dropped before resolving, §7); any token
    /// already assigned to this acquire at that point is returned via
    /// [`Semaphore::release`] instead of being lost.
    pub async fn acquire_async(&self) -> bool {
        if self.try_acquire() {
            checkpoint::checkpoint_async(Fairness::Configured).await;
            return true;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(available = self.available(), "semaphore contended, suspending task");

        let waiter = Arc::new(Waiter::asynchronous(false));
        self.waiters.push_back(waiter.clone());

        if self.try_take_token() {
            waiter.wake();
            return true;
        }

        let mut cleanup = WaiterCleanup {
            sem: self,
            waiter: waiter.clone(),
            done: false,
        };
        let woken = waiter.wait_async().await;
        cleanup.done = true;
        woken
    }

    /// Releases `n` tokens, waking up to `n` waiters (§4.F).
    ///
    /// Dequeues waiters one at a time and attempts to wake each; a waiter
    /// that had already resolved (cancelled) is skipped without spending a
    /// token. Any tokens left over once the queue is empty are pushed into
    /// `available`.
    pub fn release(&self, n: usize) {
        let mut remaining = n;
        let mut woken = 0usize;
        while remaining > 0 {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            if waiter.wake() {
                remaining -= 1;
                woken += 1;
            }
        }
        if remaining > 0 {
            self.available.fetch_add(remaining, Ordering::AcqRel);
        }
        #[cfg(feature = "tracing")]
        if woken > 0 || remaining > 0 {
            tracing::trace!(woken, tokens_returned = remaining, "semaphore release");
        }
    }
}

struct WaiterCleanup<'a> {
    sem: &'a Semaphore,
    waiter: Arc<Waiter>,
    done: bool,
}

impl Drop for WaiterCleanup<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.waiter.cancel() {
            self.sem.waiters.remove(&self.waiter);
        } else {
            // Already woken before the future was dropped: nobody is left
            // to consume the token we were handed, so give it back.
            self.sem.release(1);
        }
    }
}

/// A semaphore that additionally refuses to release more tokens than are
/// currently held (§4.F "A bounded variant").
pub struct BoundedSemaphore {
    inner: Semaphore,
    held: AtomicUsize,
}

impl BoundedSemaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            inner: Semaphore::new(initial),
            held: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn initial(&self) -> usize {
        self.inner.initial()
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.inner.available()
    }

    pub fn try_acquire(&self) -> bool {
        let acquired = self.inner.try_acquire();
        if acquired {
            self.held.fetch_add(1, Ordering::AcqRel);
        }
        acquired
    }

    pub fn acquire(&self) -> bool {
        let acquired = self.inner.acquire();
        if acquired {
            self.held.fetch_add(1, Ordering::AcqRel);
        }
        acquired
    }

    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let acquired = self.inner.acquire_timeout(timeout);
        if acquired {
            self.held.fetch_add(1, Ordering::AcqRel);
        }
        acquired
    }

    pub async fn acquire_async(&self) -> bool {
        let acquired = self.inner.acquire_async().await;
        if acquired {
            self.held.fetch_add(1, Ordering::AcqRel);
        }
        acquired
    }

    /// Releases `n` tokens. Returns `false` without changing any state if
    /// that would release more than are currently held.
    pub fn release(&self, n: usize) -> bool {
        let mut current = self.held.load(Ordering::Acquire);
        loop {
            if current < n {
                return false;
            }
            match self.held.compare_exchange_weak(
                current,
                current - n,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.inner.release(n);
        true
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use alloc::sync::Arc as StdArc;

    #[test]
    fn try_acquire_respects_count() {
        let sem = Semaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release(1);
        assert!(sem.try_acquire());
    }

    #[test]
    fn blocking_acquire_waits_for_release() {
        let sem = StdArc::new(Semaphore::new(0));
        let sem2 = sem.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            sem2.release(1);
        });
        assert!(sem.acquire());
    }

    #[test]
    fn timeout_without_release_fails() {
        let sem = Semaphore::new(0);
        assert!(!sem.acquire_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn timeout_racing_release_reports_success() {
        let sem = StdArc::new(Semaphore::new(0));
        let sem2 = sem.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(2));
            sem2.release(1);
        });
        assert!(sem.acquire_timeout(Duration::from_millis(200)));
    }

    #[test]
    fn cancellation_returns_token_to_next_waiter() {
        // Scenario S6: two waiters on Semaphore(0); release(1); cancel the
        // head before it observes the wake; the second waiter still wakes.
        let sem = StdArc::new(Semaphore::new(0));

        let sem_head = sem.clone();
        let head = std::thread::spawn(move || sem_head.acquire_timeout(Duration::from_millis(1)));

        std::thread::sleep(Duration::from_millis(20));

        let sem_second = sem.clone();
        let second = std::thread::spawn(move || sem_second.acquire_timeout(Duration::from_millis(500)));

        std::thread::sleep(Duration::from_millis(20));
        sem.release(1);

        let _ = head.join().unwrap();
        assert!(second.join().unwrap());
    }

    #[test]
    fn async_acquire_resolves() {
        let sem = Semaphore::new(1);
        let acquired = interlock_task::block_on(sem.acquire_async());
        assert!(acquired);
    }

    #[test]
    fn bounded_release_rejects_over_release() {
        let sem = BoundedSemaphore::new(1);
        assert!(sem.try_acquire());
        assert!(sem.release(1));
        assert!(!sem.release(1));
    }
}
