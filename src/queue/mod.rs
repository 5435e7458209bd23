//! Queue family (component L, §4.L): an unbounded [`SimpleQueue`] and a
//! fixed-capacity [`Queue`] generic over item order
//! (FIFO/[`LifoQueue`]/[`PriorityQueue`]).

mod bounded;
mod discipline;
mod simple;

pub use bounded::Queue;
pub use discipline::{Fifo, Lifo, Priority};
pub use simple::SimpleQueue;

/// A fixed-capacity queue that pops the most recently inserted item first
/// (§4.L "LifoQueue").
pub type LifoQueue<T> = Queue<T, Lifo>;

/// A fixed-capacity queue that pops the highest-priority (`Ord`-greatest)
/// item first (§4.L "PriorityQueue").
pub type PriorityQueue<T> = Queue<T, Priority>;
