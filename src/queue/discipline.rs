//! The container-selection half of §9's "composition + tagged variants"
//! redesign for the Queue family: one generic `Queue<T, D>` instead of the
//! source's `Queue`/`LifoQueue`/`PriorityQueue` inheritance chain, with `D`
//! a zero-sized marker type selecting the backing container — the same
//! shape [`CapacityLimiter`](crate::limiter::CapacityLimiter)'s
//! `Reentrant`/`Borrow` markers already use.
//!
//! An `enum Discipline<T> { Fifo(VecDeque<T>), Lifo(Vec<T>), Priority(BinaryHeap<T>) }`
//! was tried first and rejected: every method touching all three arms in one
//! generic function would need `T: Ord` for the `Priority` arm even when
//! called on a `Fifo`/`Lifo` instance, since Rust trait bounds are checked
//! per function, not per match arm actually taken at runtime. A trait with
//! an associated container type sidesteps this — `T: Ord` is only required
//! where [`Priority`]'s impl of [`Discipline`] is, so `Queue<T, Fifo>` works
//! for any `T`.

use alloc::collections::{BinaryHeap, VecDeque};
use alloc::vec::Vec;

/// Selects the container a [`Queue`](super::Queue) pops items from, and in
/// what order (§4.L, §9).
pub trait Discipline<T> {
    /// The concrete container backing this discipline.
    type Container: Default;

    /// Inserts `item`.
    fn push(container: &mut Self::Container, item: T);

    /// Removes and returns the next item in this discipline's order, or
    /// `None` if empty.
    fn pop(container: &mut Self::Container) -> Option<T>;

    /// Number of items currently held.
    fn len(container: &Self::Container) -> usize;
}

/// First-in-first-out discipline (the default `Queue`, §4.L).
pub struct Fifo;

impl<T> Discipline<T> for Fifo {
    type Container = VecDeque<T>;

    #[inline]
    fn push(container: &mut VecDeque<T>, item: T) {
        container.push_back(item);
    }

    #[inline]
    fn pop(container: &mut VecDeque<T>) -> Option<T> {
        container.pop_front()
    }

    #[inline]
    fn len(container: &VecDeque<T>) -> usize {
        container.len()
    }
}

/// Last-in-first-out discipline (`LifoQueue`, §4.L).
pub struct Lifo;

impl<T> Discipline<T> for Lifo {
    type Container = Vec<T>;

    #[inline]
    fn push(container: &mut Vec<T>, item: T) {
        container.push(item);
    }

    #[inline]
    fn pop(container: &mut Vec<T>) -> Option<T> {
        container.pop()
    }

    #[inline]
    fn len(container: &Vec<T>) -> usize {
        container.len()
    }
}

/// Highest-priority-first discipline (`PriorityQueue`, §4.L). Requires
/// `T: Ord`; items compare equal in priority are returned in unspecified
/// relative order, matching [`BinaryHeap`]'s own guarantee.
pub struct Priority;

impl<T: Ord> Discipline<T> for Priority {
    type Container = BinaryHeap<T>;

    #[inline]
    fn push(container: &mut BinaryHeap<T>, item: T) {
        container.push(item);
    }

    #[inline]
    fn pop(container: &mut BinaryHeap<T>) -> Option<T> {
        container.pop()
    }

    #[inline]
    fn len(container: &BinaryHeap<T>) -> usize {
        container.len()
    }
}
