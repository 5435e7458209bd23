//! Stable identifiers for the current thread, event loop, and task (component B).
//!
//! Every identifier handed out here is cheap to compute, `Copy`, and
//! suitable as a map key (`Eq + Hash`); callers use them to key borrower
//! maps ([`CapacityLimiter`](../../interlock/limiter/struct.CapacityLimiter.html))
//! and to decide whether a [`Waiter`](crate::waiter) was created on the
//! thread/loop a waker is now running on.
//!
//! Green identity (the current OS thread) is always available. Async
//! identity depends on [`detect::current_async_token`](crate::detect); when
//! no async runtime owns the current call stack, the `_async_*` functions
//! return `None` rather than panicking, leaving the failsafe-vs-error choice
//! to the caller (see [`crate::detect`]).

use core::fmt;

use crate::detect;

// -----------------------------------------------------------------------------
// GreenToken / GreenTask

/// Identity of the green runtime instance (here: the OS thread) executing
/// the current call.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GreenToken(Repr);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    #[cfg(feature = "std")]
    Thread(std::thread::ThreadId),
    Opaque(u64),
}

impl fmt::Debug for GreenToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            #[cfg(feature = "std")]
            Repr::Thread(id) => write!(f, "GreenToken::Thread({id:?})"),
            Repr::Opaque(n) => write!(f, "GreenToken::Opaque({n})"),
        }
    }
}

/// Returns the identity of the current thread, our only green runtime.
///
/// Unlike async identity this never fails: a bare OS thread with no
/// scheduler of its own is itself the "threads" runtime (§4.A).
#[inline]
pub fn current_green_token() -> GreenToken {
    crate::cfg::switch! {
        crate::cfg::std => {
            GreenToken(Repr::Thread(std::thread::current().id()))
        }
        _ => {
            // Single execution context assumed in a no_std environment.
            GreenToken(Repr::Opaque(0))
        }
    }
}

/// Identity of the task currently running on the green side.
///
/// On the "threads" runtime a task *is* its thread, so this carries the
/// same information as [`current_green_token`]; the distinct type exists so
/// call sites read like the source they're grounded on and so a future
/// green-thread runtime (fibers, stackful coroutines, ...) can diverge the
/// two without a signature change.
pub type GreenTask = GreenToken;

/// Returns the identity of the task currently running on the green side.
#[inline]
pub fn current_green_task() -> GreenTask {
    current_green_token()
}

// -----------------------------------------------------------------------------
// AsyncToken / AsyncTask

/// Identity of the async runtime instance (event loop) driving the current
/// task, if any.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AsyncToken(pub(crate) detect::AsyncRuntimeId);

/// Identity of the task currently running on the async side, if any.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AsyncTask(pub(crate) detect::AsyncRuntimeId, pub(crate) u64);

/// Returns the identity of the event loop driving the current task.
///
/// `None` when called outside any recognized async context; see
/// [`detect::current_async_token`] for the precedence used to answer this.
#[inline]
pub fn current_async_token() -> Option<AsyncToken> {
    detect::current_async_token().map(AsyncToken)
}

/// Returns the identity of the task currently running on the async side.
///
/// `None` when called outside any recognized async context.
#[inline]
pub fn current_async_task() -> Option<AsyncTask> {
    let runtime = detect::current_async_token()?;
    let task = detect::current_async_task_opaque(runtime);
    Some(AsyncTask(runtime, task))
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn green_token_is_stable_on_same_thread() {
        assert_eq!(current_green_token(), current_green_token());
    }

    #[test]
    fn green_token_differs_across_threads() {
        let here = current_green_token();
        let there = std::thread::spawn(current_green_token).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn async_token_absent_outside_async_context() {
        assert!(current_async_token().is_none());
        assert!(current_async_task().is_none());
    }
}
