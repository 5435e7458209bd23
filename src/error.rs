//! Error taxonomy (§7): contract violations, broken protocols, and the one
//! runtime-mismatch error re-exported from [`interlock_rt::detect`].

use thiserror::Error;

pub use interlock_rt::detect::AsyncLibraryNotFoundError;

/// A lock operation violated its contract.
///
/// These are programmer errors, not recoverable protocol states — unlike
/// [`BrokenBarrierError`] or [`BusyResourceError`], a caller is not expected
/// to handle them beyond propagating or aborting.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LockError {
    #[error("release called on a lock that is not held")]
    NotLocked,

    #[error("release called by a task that does not own this lock")]
    NotOwner,

    #[error("lock already held by the calling task (non-reentrant acquire)")]
    SelfDeadlock,

    #[error("release count {requested} exceeds held recursion level {held}")]
    CountExceedsLevel { requested: usize, held: usize },
}

/// A [`CapacityLimiter`](crate::limiter::CapacityLimiter) operation violated
/// its contract.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LimiterError {
    #[error("task already borrowed from this non-reentrant limiter")]
    Reentered,

    #[error("release called by a task holding no tokens from this limiter")]
    NotBorrowed,
}

/// Raised by a party on a [`Barrier`](crate::barrier::Barrier) whose
/// generation broke before every party arrived (§4.J, §7).
#[derive(Debug, Error, Clone, Copy, Default, PartialEq, Eq)]
#[error("barrier broken: a party aborted before all parties arrived")]
pub struct BrokenBarrierError;

/// Raised by [`ResourceGuard::enter`](crate::guard::ResourceGuard::enter)
/// when the guarded resource is already in use (§4.M, §7).
#[derive(Debug, Error, Clone, Copy, Default, PartialEq, Eq)]
#[error("resource already in use")]
pub struct BusyResourceError;

/// Raised by a non-blocking queue `get` against an empty queue (§7).
#[derive(Debug, Error, Clone, Copy, Default, PartialEq, Eq)]
#[error("queue is empty")]
pub struct QueueEmpty;

/// Raised by a non-blocking queue `put` against a full bounded queue (§7).
#[derive(Debug, Error, Clone, Copy, Default, PartialEq, Eq)]
#[error("queue is full")]
pub struct QueueFull;
