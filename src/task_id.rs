//! Combined task identity (§4.B, GLOSSARY "Task identity"): whichever of
//! the async or green identity actually applies to the calling task.
//!
//! Async identity is preferred when present — within a task running on an
//! async runtime, the green (thread) identity is merely "whichever worker
//! thread happens to be running this task right now", which is not stable
//! across `.await` points on a multi-threaded runtime and so is the wrong
//! key for an owner/borrower map. Falling back to the green identity keeps
//! plain OS threads (no async runtime at all) working the same as ever.

use core::fmt;

use interlock_rt::ident::{self, AsyncTask, GreenTask};

/// A stable identity for "whichever task is calling right now", suitable
/// as a map key ([`Lock`](crate::lock) ownership, [`CapacityLimiter`]
/// borrowers).
///
/// [`CapacityLimiter`]: crate::limiter::CapacityLimiter
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    Async(AsyncTask),
    Green(GreenTask),
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Async(task) => fmt::Debug::fmt(task, f),
            TaskId::Green(task) => fmt::Debug::fmt(task, f),
        }
    }
}

/// Returns the identity of the task currently executing: the async task
/// driving the current call if one exists, else the current OS thread.
#[inline]
pub fn current_task_id() -> TaskId {
    match ident::current_async_task() {
        Some(task) => TaskId::Async(task),
        None => TaskId::Green(ident::current_green_task()),
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_green_outside_async_context() {
        assert!(matches!(current_task_id(), TaskId::Green(_)));
    }

    #[test]
    fn stable_within_one_call() {
        assert_eq!(current_task_id(), current_task_id());
    }
}
