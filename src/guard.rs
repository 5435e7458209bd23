//! Resource guard (component M, §4.M): a single-occupancy sentinel for
//! asserting exclusive use of a non-thread-safe resource. Sync-only, no
//! async flavor — §4.M calls it "trivial", and nothing here ever suspends.

use interlock_rt::flag::Flag;

use crate::error::BusyResourceError;

/// Asserts that at most one caller is using the guarded resource at a time.
///
/// Unlike the lock family, a busy guard is a contract violation reported to
/// the caller (`Err`), not something to block/suspend waiting for — §4.M's
/// resources are "non-thread-safe", so a second concurrent user is always a
/// bug to surface immediately, never a queue to join.
pub struct ResourceGuard {
    occupied: Flag<()>,
}

impl ResourceGuard {
    /// Creates a guard for a resource that is not yet in use.
    pub fn new() -> Self {
        Self {
            occupied: Flag::new(),
        }
    }

    /// Attempts to enter. `Err(BusyResourceError)` if already entered;
    /// otherwise returns an [`Entered`] token whose `Drop` calls
    /// [`ResourceGuard::exit`] automatically.
    pub fn enter(&self) -> Result<Entered<'_>, BusyResourceError> {
        if self.occupied.set(()) {
            Ok(Entered { guard: self })
        } else {
            Err(BusyResourceError)
        }
    }

    /// Vacates the guard. Idempotent: a no-op if not currently entered.
    ///
    /// Exposed directly (in addition to [`Entered`]'s `Drop`) for callers
    /// that enter and exit across points that don't nest as a single Rust
    /// scope.
    pub fn exit(&self) {
        self.occupied.clear();
    }

    /// `true` if the guard is currently entered. Racy by nature; for
    /// introspection only.
    pub fn is_busy(&self) -> bool {
        self.occupied.is_set()
    }
}

impl Default for ResourceGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of having entered a [`ResourceGuard`]; exits it on drop.
pub struct Entered<'a> {
    guard: &'a ResourceGuard,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.exit();
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn second_concurrent_enter_is_rejected() {
        let guard = ResourceGuard::new();
        let first = guard.enter().unwrap();
        assert!(guard.enter().is_err());
        drop(first);
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn exit_is_idempotent() {
        let guard = ResourceGuard::new();
        guard.exit();
        assert!(!guard.is_busy());
        let entered = guard.enter().unwrap();
        drop(entered);
        guard.exit();
        assert!(guard.enter().is_ok());
    }
}
