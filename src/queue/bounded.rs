//! Bounded queue (§4.L "Queue", `LifoQueue`, `PriorityQueue"): a fixed
//! number of slots, shared between producers (who wait iff full) and
//! consumers (who wait iff empty).
//!
//! Builds on two [`Semaphore`]s instead of the source's single combined
//! waiter queue plus an "unlocked" token cell: `slots` starts at `maxsize`
//! and counts free capacity, `filled` starts at zero and counts items ready
//! to be taken. A producer acquires a slot, pushes, then releases a filled
//! permit; a consumer acquires a filled permit, pops, then releases a slot.
//! This gives the three invariants of §3's Queue state directly from
//! `Semaphore`'s own guarantees (already established in `semaphore.rs`):
//! size never exceeds `maxsize` (bounded by the `slots` count), a put is
//! always eventually visible to some get (the `filled` release that follows
//! every push), and producers/consumers wait exactly when full/empty
//! (exactly what `slots`/`filled` being exhausted means). It also sidesteps
//! source ambiguity 2 (§9 Open Questions) by construction: `maxsize` is a
//! `NonZeroUsize`, so the "unbounded" case is a different type
//! ([`SimpleQueue`](super::SimpleQueue)) rather than a branch that is
//! unreachable only by convention.

use core::num::NonZeroUsize;
use core::time::Duration;
use core::marker::PhantomData;

use interlock_rt::sync::Mutex;

use crate::error::{QueueEmpty, QueueFull};
use crate::queue::discipline::{Discipline, Fifo};
use crate::semaphore::Semaphore;

/// A fixed-capacity queue, generic over the order items come back out in
/// (`D`, default [`Fifo`]). See [`super::LifoQueue`] and
/// [`super::PriorityQueue`] for the other two dispositions.
pub struct Queue<T, D: Discipline<T> = Fifo> {
    items: Mutex<D::Container>,
    maxsize: NonZeroUsize,
    slots: Semaphore,
    filled: Semaphore,
    _discipline: PhantomData<D>,
}

impl<T, D: Discipline<T>> Queue<T, D> {
    /// Creates an empty queue holding at most `maxsize` items.
    pub fn new(maxsize: NonZeroUsize) -> Self {
        Self {
            items: Mutex::new(D::Container::default()),
            maxsize,
            slots: Semaphore::new(maxsize.get()),
            filled: Semaphore::new(0),
            _discipline: PhantomData,
        }
    }

    /// The capacity this queue was constructed with.
    #[inline]
    pub fn maxsize(&self) -> NonZeroUsize {
        self.maxsize
    }

    /// Current number of items held. Racy by nature; for introspection
    /// only.
    pub fn qsize(&self) -> usize {
        D::len(&self.items.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// `true` if [`Queue::qsize`] is currently zero.
    pub fn is_empty(&self) -> bool {
        self.qsize() == 0
    }

    /// `true` if [`Queue::qsize`] currently equals [`Queue::maxsize`].
    pub fn is_full(&self) -> bool {
        self.qsize() >= self.maxsize.get()
    }

    /// Attempts to insert `item` without blocking. `Err` (returning `item`)
    /// if the queue is currently full.
    pub fn try_put(&self, item: T) -> Result<(), (T, QueueFull)> {
        if !self.slots.try_acquire() {
            return Err((item, QueueFull));
        }
        self.push(item);
        Ok(())
    }

    /// Blocks the calling OS thread until a slot is free, then inserts
    /// `item`.
    pub fn put(&self, item: T) {
        #[cfg(feature = "tracing")]
        if self.is_full() {
            tracing::trace!(maxsize = self.maxsize.get(), "queue full, producer blocking");
        }
        self.slots.acquire();
        self.push(item);
    }

    /// Like [`Queue::put`], giving up (returning `item`) after `timeout`.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), (T, QueueFull)> {
        if !self.slots.acquire_timeout(timeout) {
            return Err((item, QueueFull));
        }
        self.push(item);
        Ok(())
    }

    /// Suspends the calling task until a slot is free, then inserts `item`.
    pub async fn put_async(&self, item: T) {
        self.slots.acquire_async().await;
        self.push(item);
    }

    /// Attempts to remove the next item without blocking. `Err` if empty.
    pub fn try_get(&self) -> Result<T, QueueEmpty> {
        if !self.filled.try_acquire() {
            return Err(QueueEmpty);
        }
        Ok(self.pop())
    }

    /// Blocks the calling OS thread until an item is available, then
    /// removes and returns it.
    pub fn get(&self) -> T {
        #[cfg(feature = "tracing")]
        if self.is_empty() {
            tracing::trace!("queue empty, consumer blocking");
        }
        self.filled.acquire();
        self.pop()
    }

    /// Like [`Queue::get`], giving up after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, QueueEmpty> {
        if !self.filled.acquire_timeout(timeout) {
            return Err(QueueEmpty);
        }
        Ok(self.pop())
    }

    /// Suspends the calling task until an item is available, then removes
    /// and returns it.
    pub async fn get_async(&self) -> T {
        self.filled.acquire_async().await;
        self.pop()
    }

    fn push(&self, item: T) {
        D::push(&mut self.items.lock().unwrap_or_else(|e| e.into_inner()), item);
        self.filled.release(1);
    }

    fn pop(&self) -> T {
        let item = D::pop(&mut self.items.lock().unwrap_or_else(|e| e.into_inner()))
            .expect("filled permit implies an item is present");
        self.slots.release(1);
        item
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use crate::queue::discipline::{Lifo, Priority};
    use alloc::sync::Arc as StdArc;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn fifo_respects_capacity_and_order() {
        let queue: Queue<i32, Fifo> = Queue::new(cap(2));
        assert!(queue.try_put(1).is_ok());
        assert!(queue.try_put(2).is_ok());
        assert!(queue.try_put(3).is_err());
        assert_eq!(queue.get(), 1);
        assert_eq!(queue.get(), 2);
    }

    #[test]
    fn lifo_pops_most_recent() {
        let queue: Queue<i32, Lifo> = Queue::new(cap(3));
        queue.put(1);
        queue.put(2);
        queue.put(3);
        assert_eq!(queue.get(), 3);
        assert_eq!(queue.get(), 2);
        assert_eq!(queue.get(), 1);
    }

    #[test]
    fn priority_pops_highest_first() {
        let queue: Queue<i32, Priority> = Queue::new(cap(3));
        queue.put(1);
        queue.put(5);
        queue.put(3);
        assert_eq!(queue.get(), 5);
        assert_eq!(queue.get(), 3);
        assert_eq!(queue.get(), 1);
    }

    #[test]
    fn unbounded_producers_never_block_bounded_does() {
        // Scenario S3-adjacent: maxsize=2, producers hand off to a
        // consumer; qsize never exceeds 2.
        let queue = StdArc::new(Queue::<i32, Fifo>::new(cap(2)));
        queue.put(1);
        queue.put(2);
        assert_eq!(queue.qsize(), 2);
        assert!(queue.is_full());

        let queue2 = queue.clone();
        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            queue2.get()
        });
        queue.put(3); // blocks until the consumer frees a slot
        assert_eq!(consumer.join().unwrap(), 1);
    }

    #[test]
    fn s3_bounded_queue_three_producers_two_consumers() {
        // Scenario S3: maxsize=2, 3 producers hand off [A,B,C,D,E] (here
        // 1..=5), 2 consumers drain all five; qsize never exceeds 2 and no
        // producer/consumer is left parked once every item is accounted
        // for.
        let queue = StdArc::new(Queue::<i32, Fifo>::new(cap(2)));
        let produced: alloc::vec::Vec<i32> = (1..=5).collect();

        let producers: alloc::vec::Vec<_> = produced
            .chunks(2)
            .map(|chunk| {
                let queue = queue.clone();
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for item in chunk {
                        queue.put(item);
                    }
                })
            })
            .collect();

        let consumed = StdArc::new(Mutex::new(alloc::vec::Vec::new()));
        let consumers: alloc::vec::Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                let consumed = consumed.clone();
                std::thread::spawn(move || loop {
                    let Ok(item) = queue.get_timeout(Duration::from_millis(200)) else {
                        break;
                    };
                    consumed.lock().unwrap_or_else(|e| e.into_inner()).push(item);
                })
            })
            .collect();

        for handle in producers {
            handle.join().unwrap();
        }
        for handle in consumers {
            handle.join().unwrap();
        }

        let mut got = consumed.lock().unwrap_or_else(|e| e.into_inner()).clone();
        got.sort_unstable();
        assert_eq!(got, produced);
        assert_eq!(queue.qsize(), 0);
    }

    #[test]
    fn get_timeout_on_empty_queue_fails() {
        let queue: Queue<i32, Fifo> = Queue::new(cap(1));
        assert!(queue.get_timeout(Duration::from_millis(5)).is_err());
    }

    #[test]
    fn async_put_get_roundtrip() {
        let queue: Queue<i32, Fifo> = Queue::new(cap(1));
        interlock_task::block_on(async {
            queue.put_async(9).await;
            assert_eq!(queue.get_async().await, 9);
        });
    }
}
