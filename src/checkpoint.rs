//! Checkpoint service (component E, §4.E): yields the calling thread/task
//! to its host scheduler at well-defined points so a contended primitive
//! cannot starve its peers.
//!
//! A checkpoint is unconditional in [`Fairness::Forced`] mode and in
//! [`cancel_shielded_checkpoint`]; otherwise it only yields if the calling
//! domain's configured checkpoint flag is set ([`crate::config`]).

use core::task::Poll;

use crate::config;

/// Which checkpoint policy a call site should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fairness {
    /// Yield only if the calling domain's checkpoint flag is enabled.
    Configured,
    /// Yield unconditionally.
    Forced,
}

#[inline]
fn threads_checkpoints_enabled() -> bool {
    config::current().threads_checkpoints
}

#[inline]
fn tokio_checkpoints_enabled() -> bool {
    config::current().tokio_checkpoints
}

/// Yields the calling OS thread to the scheduler (green side).
///
/// Called after a successful, non-blocking acquire/release on a contended
/// primitive when fairness checkpoints are enabled for the threads domain,
/// so a tight retry loop on one thread cannot starve others. A no-op under
/// the `no_std` fallback, which assumes a single execution context.
pub fn checkpoint(fairness: Fairness) {
    if fairness == Fairness::Forced || threads_checkpoints_enabled() {
        yield_now();
    }
}

/// Suspends the calling task once, yielding to the async runtime's
/// scheduler (async side). See [`checkpoint`] for the sync counterpart.
pub async fn checkpoint_async(fairness: Fairness) {
    if fairness == Fairness::Forced || tokio_checkpoints_enabled() {
        yield_once().await;
    }
}

/// Observes pending cancellation without necessarily yielding.
///
/// In this crate cancellation is carried explicitly through
/// [`interlock_task::waiter::Waiter`] rather than an ambient per-task
/// cancellation flag, so this reduces to inspecting the waiter directly;
/// exposed as a free function for call sites that only have a `&Waiter` and
/// want to early-exit a loop without a full `wait`.
#[inline]
pub fn checkpoint_if_cancelled(waiter: &interlock_task::waiter::Waiter) -> bool {
    waiter.is_cancelled()
}

/// Yields unconditionally, in a way that cannot itself be interrupted by
/// cancellation — used by a primitive mid-handoff (e.g. a condition
/// variable re-acquiring its lock) where the protocol must complete
/// regardless of the caller's own cancellation state.
#[inline]
pub fn cancel_shielded_checkpoint() {
    yield_now();
}

#[inline]
fn yield_now() {
    crate::cfg::std! {
        std::thread::yield_now();
    }
}

async fn yield_once() {
    let mut polled = false;
    core::future::poll_fn(move |cx| {
        if polled {
            Poll::Ready(())
        } else {
            polled = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    #[test]
    fn forced_checkpoint_does_not_panic() {
        checkpoint(Fairness::Forced);
    }

    #[test]
    fn async_checkpoint_resolves() {
        interlock_task::block_on(checkpoint_async(Fairness::Forced));
    }
}
