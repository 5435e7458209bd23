//! Condition variable (component K, §4.K): a notify/wait queue layered on
//! top of a caller-supplied lock.
//!
//! `Condition<L>` is generic over `L` rather than hard-coding one lock type
//! (§9 "duck typing → interface abstraction"; see [`crate::rt_integration`]
//! for the `SyncLock`/`AsyncLock`/`SaveRestore` traits this is bounded by).
//! Every wait releases the lock, suspends, and re-acquires the lock before
//! returning — exactly the three-step protocol `std::sync::Condvar` +
//! `MutexGuard` encode implicitly, made explicit here because this crate's
//! locks have no RAII guard to hide it in (see `lock/mod.rs`'s module doc).
//!
//! Waiters are tagged with a monotonically increasing ticket so
//! `notify`/`notify_all` can target "every waiter registered before this
//! call" without waking one that subscribes concurrently with the
//! notification (§4.K "Stale waiters", mirroring `REvent`'s generation
//! marker).
//!
//! The lock re-acquisition after a wait is meant to be shielded (§4.K: "a
//! cancellation arriving here does not leave the lock unheld when returning
//! to the user"). On the green side this holds exactly: `wait`/`wait_timeout`
//! block synchronously and always run the re-acquire before returning,
//! cancelled or not. On the async side Rust has no equivalent of Python's
//! `finally` surviving a `Future` being dropped mid-poll: a cancelled
//! `wait_async` (the future dropped while suspended) cannot run the
//! re-acquire step at all, since dropping a future cannot await further work.
//! This is the same limitation `tokio::sync::Notify` and `async-lock`'s
//! condition types document; see this module's `DESIGN.md` entry. A task
//! that needs a hard guarantee of reacquiring the lock even under
//! cancellation should use the green API on that `Condition` instead.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use interlock_rt::sync::Mutex;
use interlock_rt::time::Instant;
use interlock_task::waiter::Waiter;

use crate::checkpoint::{self, Fairness};
use crate::rt_integration::{AsyncLock, SaveRestore, SyncLock};

struct Entry {
    waiter: Arc<Waiter>,
    ticket: u64,
}

/// A condition variable guarding the state protected by lock `L` (§4.K).
pub struct Condition<L> {
    lock: L,
    next_ticket: AtomicU64,
    waiters: Mutex<VecDeque<Entry>>,
}

impl<L> Condition<L> {
    /// Wraps `lock` as the lock this condition variable's waits release and
    /// re-acquire.
    pub fn new(lock: L) -> Self {
        Self {
            lock,
            next_ticket: AtomicU64::new(0),
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// The lock this condition variable guards.
    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// A ticket greater than every waiter currently registered. Pass to
    /// [`Condition::notify_deadline`]/[`Condition::notify_all_deadline`] to
    /// notify exactly the waiters registered so far, excluding any that
    /// subscribe concurrently with the call (§4.K "Stale waiters").
    pub fn current_ticket(&self) -> u64 {
        self.next_ticket.load(Ordering::Acquire)
    }

    fn enqueue(&self, waiter: Arc<Waiter>) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::AcqRel);
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Entry { waiter, ticket });
        ticket
    }

    fn dequeue(&self, waiter: &Arc<Waiter>) {
        let mut guard = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = guard
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.waiter, waiter))
        {
            guard.remove(index);
        }
    }

    /// Wakes up to `n` waiters whose ticket is `<= deadline` (FIFO, §4.K).
    /// A waiter that had already resolved (e.g. cancelled) is skipped
    /// without counting against `n`.
    pub fn notify_deadline(&self, n: usize, deadline: u64) {
        let mut remaining = n;
        while remaining > 0 {
            let entry = {
                let mut guard = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
                match guard.front() {
                    Some(front) if front.ticket <= deadline => guard.pop_front(),
                    _ => None,
                }
            };
            let Some(entry) = entry else {
                break;
            };
            if entry.waiter.wake() {
                remaining -= 1;
            }
        }
    }

    /// Wakes up to `n` waiters currently registered (§4.K `notify`).
    pub fn notify(&self, n: usize) {
        self.notify_deadline(n, self.current_ticket());
    }

    /// Wakes every waiter currently registered (§4.K `notify_all`).
    pub fn notify_all(&self) {
        self.notify(usize::MAX);
    }

    /// Wakes every waiter whose ticket is `<= deadline`.
    pub fn notify_all_deadline(&self, deadline: u64) {
        self.notify_deadline(usize::MAX, deadline);
    }
}

impl<L: SyncLock + SaveRestore> Condition<L> {
    /// Releases the lock, blocks the calling OS thread until notified, then
    /// re-acquires the lock before returning (§4.K `wait`).
    ///
    /// The caller must hold the lock; see [`SaveRestore::release_save`].
    pub fn wait(&self) {
        self.wait_timeout_inner(None);
    }

    /// Like [`Condition::wait`], giving up after `timeout`. Returns `true`
    /// if notified, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_timeout_inner(Some(timeout))
    }

    fn wait_timeout_inner(&self, timeout: Option<Duration>) -> bool {
        let waiter = Arc::new(Waiter::green(false));
        self.enqueue(waiter.clone());

        let saved = self.lock.release_save();

        let woken = match timeout {
            Some(duration) => waiter.wait_timeout(duration),
            None => waiter.wait(),
        };
        if !woken && !waiter.cancel() {
            // Lost the race: a notify already claimed this waiter between
            // the timeout firing and our cancel attempt.
        } else if !woken {
            self.dequeue(&waiter);
        }

        // The re-acquire below must run regardless of `woken`, so a
        // cancelled wait still returns with the lock held (§4.K shielding).
        checkpoint::cancel_shielded_checkpoint();
        self.lock.acquire_restore(saved);
        woken
    }

    /// Waits until `predicate` returns `true`, re-checking it after each
    /// notification (§4.K `wait_for`). The lock is held both while
    /// evaluating `predicate` and on return.
    pub fn wait_for(&self, mut predicate: impl FnMut() -> bool) {
        while !predicate() {
            self.wait();
        }
    }

    /// Like [`Condition::wait_for`], bounded by an overall `timeout` spent
    /// across all the waits it may take. Returns `true` iff `predicate`
    /// became true before the deadline.
    pub fn wait_for_timeout(&self, mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if predicate() {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return false;
            }
            self.wait_timeout(timeout - elapsed);
        }
    }
}

impl<L: AsyncLock + SaveRestore> Condition<L> {
    /// Async counterpart to [`Condition::wait`].
    pub async fn wait_async(&self) {
        let waiter = Arc::new(Waiter::asynchronous(false));
        self.enqueue(waiter.clone());

        let saved = self.lock.release_save();

        let mut cleanup = AsyncWaitCleanup {
            condition: self,
            waiter: waiter.clone(),
            done: false,
        };
        waiter.wait_async().await;
        cleanup.done = true;

        checkpoint::cancel_shielded_checkpoint();
        self.lock.acquire_restore_async(saved).await;
    }

    /// Async counterpart to [`Condition::wait_for`].
    pub async fn wait_for_async(&self, mut predicate: impl FnMut() -> bool) {
        while !predicate() {
            self.wait_async().await;
        }
    }
}

// `interlock-task::waiter::Waiter` has no built-in async timeout (no timer
// of its own, by design — see `interlock-task`'s module doc); a bounded
// async wait needs a real timer, so this variant only exists when `tokio`
// is available to race the wait against `tokio::time::timeout`.
#[cfg(feature = "tokio")]
impl<L: AsyncLock + SaveRestore> Condition<L> {
    /// Async counterpart to [`Condition::wait_timeout`]. Requires the
    /// `tokio` feature for its timer.
    pub async fn wait_timeout_async(&self, timeout: Duration) -> bool {
        let waiter = Arc::new(Waiter::asynchronous(false));
        self.enqueue(waiter.clone());

        let saved = self.lock.release_save();

        let mut cleanup = AsyncWaitCleanup {
            condition: self,
            waiter: waiter.clone(),
            done: false,
        };
        let raced_out = ::tokio::time::timeout(timeout, waiter.wait_async())
            .await
            .is_err();
        cleanup.done = true;

        let woken = if raced_out {
            if waiter.cancel() {
                self.dequeue(&waiter);
                false
            } else {
                // A notify claimed the waiter between the timer firing and
                // our cancel attempt; treat as a successful wake.
                true
            }
        } else {
            true
        };

        checkpoint::cancel_shielded_checkpoint();
        self.lock.acquire_restore_async(saved).await;
        woken
    }

    /// Async counterpart to [`Condition::wait_for_timeout`]. Requires the
    /// `tokio` feature.
    pub async fn wait_for_timeout_async(
        &self,
        mut predicate: impl FnMut() -> bool,
        timeout: Duration,
    ) -> bool {
        let start = Instant::now();
        loop {
            if predicate() {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return false;
            }
            self.wait_timeout_async(timeout - elapsed).await;
        }
    }
}

struct AsyncWaitCleanup<'a, L> {
    condition: &'a Condition<L>,
    waiter: Arc<Waiter>,
    done: bool,
}

impl<L> Drop for AsyncWaitCleanup<'_, L> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // The future was dropped while suspended (external cancellation):
        // vacate our slot so a concurrent `notify` does not spend a wake on
        // a waiter nobody will ever poll again. The lock stays released —
        // see this module's doc comment on the async shielding limitation.
        if self.waiter.cancel() {
            self.condition.dequeue(&self.waiter);
        }
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use crate::lock::Lock;
    use alloc::sync::Arc as StdArc;

    #[test]
    fn wait_for_observes_predicate_set_by_notifier() {
        let cond = StdArc::new(Condition::new(Lock::new()));
        cond.lock().lock();

        let ready = StdArc::new(interlock_rt::sync::atomic::AtomicBool::new(false));

        let cond2 = cond.clone();
        let ready2 = ready.clone();
        let notifier = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            cond2.lock().lock();
            ready2.store(true, Ordering::Release);
            cond2.notify(1);
            cond2.lock().unlock();
        });

        cond.wait_for(|| ready.load(Ordering::Acquire));
        assert!(ready.load(Ordering::Acquire));
        cond.lock().unlock();

        notifier.join().unwrap();
    }

    #[test]
    fn wait_timeout_without_notify_times_out() {
        let cond = Condition::new(Lock::new());
        cond.lock().lock();
        assert!(!cond.wait_timeout(Duration::from_millis(5)));
        // Shielded re-acquire still holds the lock on timeout.
        assert!(cond.lock().is_locked());
        cond.lock().unlock();
    }

    #[test]
    fn stale_waiter_registered_after_deadline_is_not_woken() {
        let cond = StdArc::new(Condition::new(Lock::new()));
        let deadline = cond.current_ticket();

        let waiter = StdArc::new(Waiter::green(false));
        cond.enqueue(waiter.clone());
        // `waiter`'s ticket is `>= deadline`, registered after the
        // snapshot, so a deadline-bounded notify must not wake it.
        cond.notify_all_deadline(deadline);
        assert!(waiter.is_pending());
    }

    #[test]
    fn async_wait_for_resolves_after_notify() {
        let cond = StdArc::new(Condition::new(Lock::new()));
        interlock_task::block_on(async {
            cond.lock().lock_async().await;
            cond.lock().unlock();
        });

        let ready = StdArc::new(interlock_rt::sync::atomic::AtomicBool::new(true));
        interlock_task::block_on(async {
            cond.lock().lock_async().await;
            cond.wait_for_async(|| ready.load(Ordering::Acquire)).await;
            cond.lock().unlock();
        });
    }
}
