//! Lock family (component G, §4.G): plain, bounded, owned, and reentrant
//! mutexes, all built on [`Semaphore`](crate::semaphore::Semaphore) with
//! `initial = 1`.
//!
//! Every flavor exposes explicit `lock`/`try_lock`/`unlock` operations
//! rather than an RAII guard: unlike `std::sync::Mutex`, the owner and
//! reentrant variants need release to be a distinguishable, independently
//! callable step (checked against the caller's identity, or decrementing a
//! recursion level) for [`Condition`](crate::condition::Condition) to
//! compose with via `release_save`/`acquire_restore` (§4.G, §4.K) — a guard
//! whose `Drop` always fully unlocks cannot express "release N of M levels
//! and hand the rest to whichever task a condition variable wakes next".

mod bounded;
mod owned;
mod plain;
mod reentrant;

pub use bounded::BoundedLock;
pub use owned::OwnedLock;
pub use plain::Lock;
pub use reentrant::{RLock, SavedState};
