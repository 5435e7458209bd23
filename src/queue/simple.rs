//! Unbounded queue (§4.L "SimpleQueue"): a counting semaphore over an
//! unbounded container. Producers never block; `get`/`get_async` fall
//! through directly to [`Semaphore`]'s existing FIFO-fair, no-lost-wakeup
//! acquire, so this module adds nothing beyond the container itself.

use alloc::collections::VecDeque;
use core::time::Duration;

use interlock_rt::sync::Mutex;

use crate::error::QueueEmpty;
use crate::semaphore::Semaphore;

/// An unbounded FIFO queue. `put` never blocks; `get` blocks/suspends until
/// an item is available (§4.L).
pub struct SimpleQueue<T> {
    items: Mutex<VecDeque<T>>,
    filled: Semaphore,
}

impl<T> SimpleQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            filled: Semaphore::new(0),
        }
    }

    /// Appends `item`. Constant-time, never blocks (§4.L).
    pub fn put(&self, item: T) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
        self.filled.release(1);
    }

    /// Removes and returns the front item without blocking. `Err` if empty.
    pub fn try_get(&self) -> Result<T, QueueEmpty> {
        if !self.filled.try_acquire() {
            return Err(QueueEmpty);
        }
        Ok(self.pop_front_or_panic())
    }

    /// Blocks the calling OS thread until an item is available, then
    /// removes and returns it.
    pub fn get(&self) -> T {
        self.filled.acquire();
        self.pop_front_or_panic()
    }

    /// Like [`SimpleQueue::get`], giving up after `timeout`. `Err` on
    /// timeout.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, QueueEmpty> {
        if !self.filled.acquire_timeout(timeout) {
            return Err(QueueEmpty);
        }
        Ok(self.pop_front_or_panic())
    }

    /// Suspends the calling task until an item is available, then removes
    /// and returns it.
    pub async fn get_async(&self) -> T {
        self.filled.acquire_async().await;
        self.pop_front_or_panic()
    }

    /// Current number of items held. Racy by nature; for introspection
    /// only.
    pub fn qsize(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// `true` if [`SimpleQueue::qsize`] is currently zero.
    pub fn is_empty(&self) -> bool {
        self.qsize() == 0
    }

    fn pop_front_or_panic(&self) -> T {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .expect("filled permit implies an item is present")
    }
}

impl<T> Default for SimpleQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use alloc::sync::Arc as StdArc;

    #[test]
    fn fifo_order_preserved() {
        let queue = SimpleQueue::new();
        queue.put(1);
        queue.put(2);
        queue.put(3);
        assert_eq!(queue.get(), 1);
        assert_eq!(queue.get(), 2);
        assert_eq!(queue.get(), 3);
    }

    #[test]
    fn try_get_empty_fails() {
        let queue: SimpleQueue<i32> = SimpleQueue::new();
        assert!(queue.try_get().is_err());
    }

    #[test]
    fn get_blocks_until_put() {
        let queue = StdArc::new(SimpleQueue::new());
        let queue2 = queue.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            queue2.put(42);
        });
        assert_eq!(queue.get(), 42);
    }

    #[test]
    fn async_get_resolves() {
        let queue = SimpleQueue::new();
        queue.put(7);
        let item = interlock_task::block_on(queue.get_async());
        assert_eq!(item, 7);
    }
}
