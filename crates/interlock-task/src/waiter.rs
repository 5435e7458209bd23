//! The one-shot rendezvous object every blocking operation in `interlock`
//! funnels through (component D, §4.D): `Waiter`.
//!
//! A `Waiter` is created pending by exactly one caller — a thread about to
//! block, or a task about to suspend — and is driven to completion exactly
//! once, by exactly one of:
//!
//! - a call to [`Waiter::wake`] (from any thread, any task, any domain);
//! - a local cancellation ([`Waiter::cancel`]), refused while [shielded].
//!
//! [shielded]: Waiter::shield
//!
//! The two suspension mechanisms share one state machine
//! (`pending → woken`, `pending → cancelled`, both terminal) but differ in
//! how a waiting caller actually blocks:
//!
//! - [`Waiter::wait`] parks the calling OS thread on a [`Condvar`], mirroring
//!   the C++ mapping in the design notes (§9) and, unlike `thread::park`,
//!   working identically under the `no_std` fallback `Condvar`.
//! - [`Waiter::wait_async`] suspends the calling task, backed by an
//!   [`AtomicWaker`] — the same "`Future` plus side-channel" shape the
//!   design notes prescribe for Rust, and the same crate [`mini_executor`]
//!   already depends on.
//!
//! Both paths reduce `wake()` to a call that is safe from any thread and any
//! task: `Condvar::notify_one` and `AtomicWaker::wake` are documented to
//! tolerate being invoked from anywhere, so there is no separate
//! same-domain/cross-domain code path to pick between at the call site. The
//! domain/token recorded at construction (`kind`, via
//! [`interlock_rt::ident`]) therefore exists purely for introspection — it
//! is what a primitive's borrower/owner maps key on — not to steer `wake`.
//!
//! [`mini_executor`]: crate::mini_executor

use core::task::Poll;
use core::time::Duration;

use atomic_waker::AtomicWaker;

use interlock_rt::sync::atomic::{AtomicU8, Ordering};
use interlock_rt::sync::{Condvar, Mutex};

// -----------------------------------------------------------------------------
// State

const PENDING: u8 = 0;
const WOKEN: u8 = 1;
const CANCELLED: u8 = 2;

// -----------------------------------------------------------------------------
// Waiter

/// A one-shot, single-consumer notification object (§4.D).
///
/// Exactly one of `wait`/`.await` is expected per instance; calling both, or
/// calling either twice, is a logic error in the caller, not something this
/// type detects.
pub struct Waiter {
    state: AtomicU8,
    shielded: interlock_rt::sync::atomic::AtomicBool,
    signal: Signal,
}

enum Signal {
    /// Backs the green (blocking) side: a `(Mutex<bool>, Condvar)` pair
    /// where the bool is "has `wake` run yet".
    Green(Mutex<bool>, Condvar),
    /// Backs the async (suspending) side.
    Async(AtomicWaker),
}

impl Waiter {
    /// Creates a pending waiter meant to be `wait`ed on synchronously,
    /// blocking the calling OS thread.
    pub fn green(shield: bool) -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            shielded: interlock_rt::sync::atomic::AtomicBool::new(shield),
            signal: Signal::Green(Mutex::new(false), Condvar::new()),
        }
    }

    /// Creates a pending waiter meant to be `.await`ed, suspending the
    /// calling task.
    pub fn asynchronous(shield: bool) -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            shielded: interlock_rt::sync::atomic::AtomicBool::new(shield),
            signal: Signal::Async(AtomicWaker::new()),
        }
    }

    /// Returns `true` while local cancellation is suppressed for this
    /// waiter (§4.D "Shielding rationale").
    #[inline]
    pub fn is_shielded(&self) -> bool {
        self.shielded.load(Ordering::Acquire)
    }

    /// Enables or disables the shield. Primitives toggle this around the
    /// single wait that must complete a handoff protocol (e.g. a condition
    /// variable re-acquiring its lock after being notified).
    #[inline]
    pub fn set_shield(&self, shield: bool) {
        self.shielded.store(shield, Ordering::Release);
    }

    /// Returns `true` if this waiter has transitioned to `cancelled`.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Returns `true` if this waiter has transitioned to `woken`.
    #[inline]
    pub fn is_woken(&self) -> bool {
        self.state.load(Ordering::Acquire) == WOKEN
    }

    /// Returns `true` if this waiter is still pending (neither terminal
    /// state reached). Primitives use this before attempting to dequeue a
    /// waiter from a queue so a concurrently-cancelled entry can be skipped
    /// without waking it (§4.F "release").
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Attempts to wake this waiter. Safe to call from any thread, any
    /// task, the waiter's own domain or any other.
    ///
    /// Returns `true` if this call performed the pending→woken transition,
    /// `false` if the waiter had already resolved (to woken by a previous
    /// `wake`, or to cancelled) — the "already" outcome releasers use to
    /// decide whether to move on to the next waiter (§4.F, §4.K).
    pub fn wake(&self) -> bool {
        if self
            .state
            .compare_exchange(PENDING, WOKEN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        match &self.signal {
            Signal::Green(mutex, condvar) => {
                let mut done = mutex.lock().unwrap_or_else(|e| e.into_inner());
                *done = true;
                condvar.notify_one();
            }
            Signal::Async(waker) => waker.wake(),
        }

        true
    }

    /// Attempts the local pending→cancelled transition.
    ///
    /// Returns `true` on success. Returns `false` if shielded (the
    /// transition is refused, the waiter stays pending) or if the waiter
    /// had already resolved — in the latter case a concurrent `wake` won
    /// the race and the caller must treat this as a successful wakeup
    /// instead (§4.D state machine, §5 "Cancellation & timeouts").
    pub fn cancel(&self) -> bool {
        if self.is_shielded() {
            return false;
        }

        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Blocks the calling OS thread until this waiter is woken or
    /// cancelled. Only meaningful for a waiter created via [`Waiter::green`].
    ///
    /// Returns `true` if woken, `false` if cancelled (e.g. by a timeout
    /// elsewhere driving `cancel`). This method does not itself implement
    /// timeouts; callers compose it with [`Waiter::cancel`] called from a
    /// timer, matching every primitive's `acquire(timeout)` in §4.F-§4.L,
    /// which chunk arbitrarily large timeouts themselves.
    pub fn wait(&self) -> bool {
        let Signal::Green(mutex, condvar) = &self.signal else {
            unreachable!("Waiter::wait called on an async waiter");
        };

        let guard = mutex.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = condvar
            .wait_while(guard, |done| !*done && self.is_pending())
            .unwrap_or_else(|e| e.into_inner());

        !self.is_cancelled()
    }

    /// Like [`Waiter::wait`], but gives up (returning `false`) once `timeout`
    /// elapses without cancelling the waiter itself — the caller decides
    /// whether a timed-out wait should then call [`Waiter::cancel`].
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Signal::Green(mutex, condvar) = &self.signal else {
            unreachable!("Waiter::wait_timeout called on an async waiter");
        };

        let guard = mutex.lock().unwrap_or_else(|e| e.into_inner());
        let (_guard, result) = condvar
            .wait_timeout_while(guard, timeout, |done| !*done && self.is_pending())
            .unwrap_or_else(|e| e.into_inner());

        !result.timed_out() && !self.is_cancelled()
    }

    /// Suspends the calling task until this waiter is woken or cancelled.
    /// Only meaningful for a waiter created via [`Waiter::asynchronous`].
    ///
    /// Returns `true` if woken, `false` if cancelled. Implemented with
    /// [`core::future::poll_fn`] rather than a hand-rolled `Future` impl so
    /// the waiter can stay an ordinary `&self` value shared through a queue,
    /// with no `Pin`/`Unpin` bookkeeping of its own to get right.
    pub async fn wait_async(&self) -> bool {
        let Signal::Async(waker) = &self.signal else {
            unreachable!("Waiter::wait_async called on a green waiter");
        };

        core::future::poll_fn(|cx| {
            // Register before the state re-check to close the same race the
            // semaphore's acquire-after-release append-then-retry closes: a
            // `wake()` arriving between our first state read and
            // registration would otherwise be missed.
            waker.register(cx.waker());

            match self.state.load(Ordering::Acquire) {
                PENDING => Poll::Pending,
                WOKEN => Poll::Ready(true),
                _ => Poll::Ready(false),
            }
        })
        .await
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::Waiter;
    use crate::block_on;
    use alloc::sync::Arc;

    #[test]
    fn green_wake_after_wait() {
        let waiter = Arc::new(Waiter::green(false));
        let waiter2 = waiter.clone();

        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            assert!(waiter2.wake());
        });

        assert!(waiter.wait());
    }

    #[test]
    fn green_cancel_then_wake_is_noop() {
        let waiter = Waiter::green(false);
        assert!(waiter.cancel());
        assert!(!waiter.wake());
        assert!(waiter.is_cancelled());
    }

    #[test]
    fn shield_blocks_local_cancel() {
        let waiter = Waiter::green(true);
        assert!(!waiter.cancel());
        assert!(waiter.is_pending());
        assert!(waiter.wake());
    }

    #[test]
    fn cancel_loses_race_to_wake() {
        let waiter = Waiter::green(false);
        assert!(waiter.wake());
        // The wake already claimed the transition; a later cancel attempt
        // must report failure rather than stomping a resolved waiter.
        assert!(!waiter.cancel());
        assert!(waiter.is_woken());
    }

    #[test]
    fn async_wake_resolves_future() {
        let waiter = Arc::new(Waiter::asynchronous(false));
        let waiter2 = waiter.clone();
        assert!(waiter2.wake());

        let woken = block_on(waiter.wait_async());
        assert!(woken);
    }

    #[test]
    fn async_cancel_resolves_false() {
        let waiter = Waiter::asynchronous(false);
        assert!(waiter.cancel());

        let woken = block_on(waiter.wait_async());
        assert!(!woken);
    }
}
