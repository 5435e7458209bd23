//! Runtime detector (component A): identify which async runtime, if any,
//! owns the current task.
//!
//! Green detection never fails — see [`crate::ident::current_green_token`],
//! a bare OS thread with no scheduler of its own already counts as the
//! "threads" runtime. Async detection is the interesting half: unlike
//! Python's `asyncio`/`trio`/`curio` plurality, the Rust ecosystem settles
//! on `tokio` as the overwhelmingly common case, so only one built-in probe
//! is wired in; [`register_probe`] lets a caller add another runtime (e.g.
//! `async-std`, `smol`, a custom test harness) without forking this crate.
//!
//! Precedence, highest first, matching §4.A:
//!
//! 1. an explicit per-thread override ([`set_thread_override`]);
//! 2. a process-wide default override ([`set_global_override`]);
//! 3. registered runtime probes, tried in registration order (built-ins
//!    first, then any added via [`register_probe`]).
//!
//! Probes are purely observational: nothing here starts, drives, or
//! otherwise owns a scheduler.

use core::fmt;

crate::cfg::std! {
    use core::cell::Cell;
    use crate::sync::atomic::{AtomicU64, Ordering};
    use crate::sync::OnceLock;
    use alloc::vec::Vec;
    use std::thread_local;
}

/// Identity of an async runtime instance (an event loop) detected on the
/// current thread.
///
/// `name` identifies the runtime (`"tokio"`, or whatever a registered probe
/// reports); `loop_id` is an opaque, thread-stable, process-unique number
/// standing in for "which instance of that runtime". It is not guaranteed
/// to track a task that migrates to a different worker thread of the same
/// runtime; see the `DESIGN.md` entry for this module for why that's an
/// acceptable trade-off here.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AsyncRuntimeId {
    pub name: &'static str,
    pub loop_id: u64,
}

impl fmt::Debug for AsyncRuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AsyncRuntimeId({}, {})", self.name, self.loop_id)
    }
}

/// Raised when async identity is requested outside any recognized async
/// context and the caller opted out of failsafe mode (§4.A, §7).
#[derive(Clone, Copy, Debug, Default)]
pub struct AsyncLibraryNotFoundError;

impl fmt::Display for AsyncLibraryNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no running async library could be detected")
    }
}

crate::cfg::std! {
    impl std::error::Error for AsyncLibraryNotFoundError {}
}

/// A runtime-specific probe: purely observational, returns `Some` iff that
/// runtime currently owns the calling stack frame.
pub type Probe = fn() -> Option<AsyncRuntimeId>;

crate::cfg::std! {
    thread_local! {
        static THREAD_OVERRIDE: Cell<Option<AsyncRuntimeId>> = const { Cell::new(None) };
    }

    static GLOBAL_OVERRIDE: OnceLock<AsyncRuntimeId> = OnceLock::new();
    static PROBES: OnceLock<ProbeRegistry> = OnceLock::new();
}

/// Forces `current_async_token` to report `token` for every call made from
/// the current thread, ahead of the process-wide override and all probes.
///
/// Intended for test harnesses and for runtime integrations that already
/// know their own identity without needing a probe (§6).
crate::cfg::std! {
    pub fn set_thread_override(token: Option<AsyncRuntimeId>) {
        THREAD_OVERRIDE.with(|cell| cell.set(token));
    }
}

/// Forces `current_async_token` to report `token` process-wide whenever no
/// per-thread override is set. Can only be set once; later calls are
/// ignored (mirrors `AIOLOGIC_ASYNC_LIBRARY`, read once at import).
crate::cfg::std! {
    pub fn set_global_override(token: AsyncRuntimeId) {
        let _ = GLOBAL_OVERRIDE.set(token);
    }
}

/// Registers an additional runtime probe, tried after the built-ins and
/// after every probe registered earlier.
crate::cfg::std! {
    pub fn register_probe(probe: Probe) {
        PROBES.get_or_init(Default::default).push(probe);
    }
}

/// Returns the identity of the async runtime driving the current task, or
/// `None` if none can be detected (failsafe mode; see
/// [`require_async_token`] for the error-raising counterpart).
#[cfg(feature = "std")]
pub fn current_async_token() -> Option<AsyncRuntimeId> {
    if let Some(token) = THREAD_OVERRIDE.with(Cell::get) {
        return Some(token);
    }

    if let Some(token) = GLOBAL_OVERRIDE.get().copied() {
        return Some(token);
    }

    #[cfg(feature = "tokio")]
    if let Some(token) = tokio_probe() {
        return Some(token);
    }

    if let Some(probes) = PROBES.get() {
        for probe in probes.snapshot() {
            if let Some(token) = probe() {
                return Some(token);
            }
        }
    }

    None
}

/// Returns the identity of the async runtime driving the current task.
///
/// Without the `std` feature there is no way to probe any async runtime
/// (no threads, no thread-locals), so this always reports "none".
#[cfg(not(feature = "std"))]
pub fn current_async_token() -> Option<AsyncRuntimeId> {
    None
}

/// Same as [`current_async_token`], but raises [`AsyncLibraryNotFoundError`]
/// instead of returning `None` (§4.A "Failure", §7 "Runtime mismatch").
pub fn require_async_token() -> Result<AsyncRuntimeId, AsyncLibraryNotFoundError> {
    current_async_token().ok_or(AsyncLibraryNotFoundError)
}

/// Opaque per-task identity within `runtime`, or `0` when the runtime does
/// not expose per-task identity (used as the `opaque_id` half of
/// `(runtime_name, opaque_id)` task identity tuples, see `ident`).
pub fn current_async_task_opaque(runtime: AsyncRuntimeId) -> u64 {
    #[cfg(feature = "tokio")]
    if runtime.name == "tokio" {
        return tokio_task_opaque();
    }

    let _ = runtime;
    0
}

#[cfg(feature = "tokio")]
fn tokio_probe() -> Option<AsyncRuntimeId> {
    ::tokio::runtime::Handle::try_current().ok()?;

    thread_local! {
        static LOOP_ID: Cell<Option<u64>> = const { Cell::new(None) };
    }

    static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

    let loop_id = LOOP_ID.with(|cell| {
        if let Some(id) = cell.get() {
            id
        } else {
            let id = NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed);
            cell.set(Some(id));
            id
        }
    });

    Some(AsyncRuntimeId {
        name: "tokio",
        loop_id,
    })
}

#[cfg(feature = "tokio")]
fn tokio_task_opaque() -> u64 {
    use core::hash::{Hash, Hasher};

    match ::tokio::task::try_id() {
        Some(id) => {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            id.hash(&mut hasher);
            hasher.finish()
        }
        None => 0,
    }
}

// -----------------------------------------------------------------------------
// Probe registry storage

crate::cfg::std! {
    /// Thin wrapper so `OnceLock<Vec<Probe>>` can grow past its first write
    /// without requiring `OnceLock::get_mut` (unavailable through a shared
    /// static). Reads take a snapshot clone; registration is expected to
    /// happen a handful of times at startup, not on a hot path.
    #[derive(Default)]
    pub(crate) struct ProbeRegistry(crate::sync::Mutex<Vec<Probe>>);

    impl ProbeRegistry {
        fn push(&self, probe: Probe) {
            self.0.lock().unwrap_or_else(|e| e.into_inner()).push(probe);
        }

        fn snapshot(&self) -> Vec<Probe> {
            self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn override_takes_precedence() {
        set_thread_override(Some(AsyncRuntimeId {
            name: "fake",
            loop_id: 42,
        }));
        assert_eq!(current_async_token().unwrap().name, "fake");
        set_thread_override(None);
    }

    #[test]
    fn none_outside_any_runtime() {
        assert!(current_async_token().is_none());
        assert!(require_async_token().is_err());
    }
}
