//! A one-shot marker cell — the smallest lock-free building block (component C).
//!
//! A [`Flag`] holds at most one value ("marker") at a time. It is used by the
//! higher-level primitives as a cheap owner/state cell: a reentrant lock's
//! owner identity, a resettable event's generation marker, a barrier's
//! reached/broken outcome, and so on.
//!
//! The canonical implementation represents the cell as a one-element
//! container from which elements may be atomically removed (popped); this
//! exploits whatever atomicity the underlying container already provides
//! instead of introducing a dedicated lock. Here that container is
//! [`ArrayQueue`] with a capacity of one.

use crate::utils::ArrayQueue;

/// A lock-free cell that contains at most one marker value.
///
/// All operations are non-blocking and tolerate arbitrary interleaving.
/// `get` is implemented as a pop-then-restore over the underlying
/// one-element container, so it is not linearizable with a concurrent
/// `set`/`clear`: a caller may observe a brief window in which the cell
/// looks empty even though a marker is logically present. This matches the
/// best-effort nature the underlying container affords and is acceptable
/// for every consumer in this crate, which only ever reads a `Flag` to
/// decide whether *some* marker has been published, not to synchronize on
/// the exact instant it appears.
pub struct Flag<T> {
    cell: ArrayQueue<T>,
}

impl<T> Flag<T> {
    /// Creates an empty flag.
    #[inline]
    pub fn new() -> Self {
        Self {
            cell: ArrayQueue::new(1),
        }
    }

    /// Creates a flag already holding `marker`.
    #[inline]
    pub fn with_marker(marker: T) -> Self {
        let flag = Self::new();
        // Capacity is 1 and nobody else observes `flag` yet, so this cannot fail.
        let _ = flag.cell.push(marker);
        flag
    }

    /// Publishes `marker` iff the cell is currently empty.
    ///
    /// Returns `true` on success, `false` if the cell already held a marker.
    #[inline]
    pub fn set(&self, marker: T) -> bool {
        self.cell.push(marker).is_ok()
    }

    /// Empties the cell, discarding any marker it held.
    ///
    /// Returns `true` if a marker was actually discarded.
    #[inline]
    pub fn clear(&self) -> bool {
        self.cell.pop().is_some()
    }

    /// Returns `true` if the cell currently holds a marker.
    #[inline]
    pub fn is_set(&self) -> bool
    where
        T: Clone,
    {
        self.get().is_some()
    }
}

impl<T: Clone> Flag<T> {
    /// Returns a clone of the marker, or `None` if the cell is empty.
    #[inline]
    pub fn get(&self) -> Option<T> {
        let marker = self.cell.pop()?;
        // Best-effort restore; capacity is 1 and we just vacated it, so
        // this only fails if a racing `set`/`clear` got there first, which
        // is exactly the non-linearizable window documented on the type.
        let _ = self.cell.push(marker.clone());
        Some(marker)
    }

    /// Returns a clone of the marker, or `default` if the cell is empty.
    #[inline]
    pub fn get_or(&self, default: T) -> T {
        self.get().unwrap_or(default)
    }
}

impl<T> Default for Flag<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::Flag;

    #[test]
    fn set_once_then_rejected() {
        let flag = Flag::new();
        assert!(flag.set(1));
        assert!(!flag.set(2));
        assert_eq!(flag.get(), Some(1));
    }

    #[test]
    fn clear_then_set_again() {
        let flag = Flag::new();
        assert!(flag.set("a"));
        assert!(flag.clear());
        assert_eq!(flag.get(), None);
        assert!(flag.set("b"));
        assert_eq!(flag.get(), Some("b"));
    }

    #[test]
    fn get_default() {
        let flag: Flag<u32> = Flag::new();
        assert_eq!(flag.get_or(7), 7);
    }
}
