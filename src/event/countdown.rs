//! Countdown event (§4.I "CountdownEvent"): a counter of opaque markers
//! that fires once it reaches zero.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use core::time::Duration;

use interlock_rt::sync::Mutex;
use interlock_task::waiter::Waiter;

use crate::checkpoint::{self, Fairness};

struct Entry {
    waiter: Arc<Waiter>,
    ticket: u64,
}

/// A counter that starts at `initial` and wakes every waiter once it
/// reaches zero (§4.I).
pub struct CountdownEvent {
    count: AtomicUsize,
    next_ticket: AtomicU64,
    waiters: Mutex<VecDeque<Entry>>,
}

impl CountdownEvent {
    /// Creates a countdown starting at `initial`.
    pub fn new(initial: usize) -> Self {
        Self {
            count: AtomicUsize::new(initial),
            next_ticket: AtomicU64::new(0),
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Current remaining count.
    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// `true` once the count has reached zero.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.count() == 0
    }

    /// Adds `n` to the remaining count (§4.I `up`).
    pub fn up(&self, n: usize) {
        self.count.fetch_add(n, Ordering::AcqRel);
    }

    /// Removes one from the remaining count (§4.I `down`), waking every
    /// waiter if this is the decrement that reaches zero. A no-op once
    /// already at zero.
    pub fn down(&self) {
        let Ok(previous) = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
        else {
            return;
        };
        if previous == 1 {
            let generation = self.next_ticket.fetch_add(1, Ordering::AcqRel) + 1;
            self.wake_up_to(generation);
        }
    }

    fn enqueue(&self) -> Arc<Waiter> {
        let waiter = Arc::new(Waiter::green(false));
        let ticket = self.next_ticket.load(Ordering::Acquire);
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Entry {
                waiter: waiter.clone(),
                ticket,
            });
        waiter
    }

    fn enqueue_async(&self) -> Arc<Waiter> {
        let waiter = Arc::new(Waiter::asynchronous(false));
        let ticket = self.next_ticket.load(Ordering::Acquire);
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Entry {
                waiter: waiter.clone(),
                ticket,
            });
        waiter
    }

    fn dequeue(&self, waiter: &Arc<Waiter>) {
        let mut guard = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = guard
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.waiter, waiter))
        {
            guard.remove(index);
        }
    }

    fn wake_up_to(&self, deadline: u64) {
        loop {
            let entry = {
                let mut guard = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
                match guard.front() {
                    Some(front) if front.ticket <= deadline => guard.pop_front(),
                    _ => None,
                }
            };
            let Some(entry) = entry else {
                break;
            };
            entry.waiter.wake();
        }
    }

    fn wait_blocking(&self, timeout: Option<Duration>) -> bool {
        if self.is_set() {
            checkpoint::checkpoint(Fairness::Configured);
            return true;
        }

        let waiter = self.enqueue();

        if self.is_set() {
            waiter.wake();
            return true;
        }

        let woken = match timeout {
            Some(duration) => waiter.wait_timeout(duration),
            None => waiter.wait(),
        };
        if woken {
            return true;
        }
        if waiter.cancel() {
            self.dequeue(&waiter);
            false
        } else {
            true
        }
    }

    /// Blocks the calling OS thread until the count reaches zero.
    pub fn wait(&self) {
        self.wait_blocking(None);
    }

    /// Like [`CountdownEvent::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_blocking(Some(timeout))
    }

    /// Suspends the calling task until the count reaches zero.
    pub async fn wait_async(&self) {
        if self.is_set() {
            checkpoint::checkpoint_async(Fairness::Configured).await;
            return;
        }

        let waiter = self.enqueue_async();

        if self.is_set() {
            waiter.wake();
            return;
        }

        let mut cleanup = WaiterCleanup {
            event: self,
            waiter: waiter.clone(),
            done: false,
        };
        waiter.wait_async().await;
        cleanup.done = true;
    }
}

struct WaiterCleanup<'a> {
    event: &'a CountdownEvent,
    waiter: Arc<Waiter>,
    done: bool,
}

impl Drop for WaiterCleanup<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.waiter.cancel() {
            self.event.dequeue(&self.waiter);
        }
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use alloc::sync::Arc as StdArc;

    #[test]
    fn fires_once_count_reaches_zero() {
        let countdown = CountdownEvent::new(2);
        assert!(!countdown.wait_timeout(Duration::from_millis(5)));
        countdown.down();
        assert!(!countdown.wait_timeout(Duration::from_millis(5)));
        countdown.down();
        assert!(countdown.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn down_past_zero_is_a_no_op() {
        let countdown = CountdownEvent::new(0);
        assert_eq!(countdown.count(), 0);
        countdown.down();
        assert_eq!(countdown.count(), 0);
    }

    #[test]
    fn up_reopens_a_fired_countdown() {
        let countdown = CountdownEvent::new(1);
        countdown.down();
        assert!(countdown.is_set());
        countdown.up(1);
        assert!(!countdown.is_set());
    }

    #[test]
    fn blocking_wait_wakes_on_final_down() {
        let countdown = StdArc::new(CountdownEvent::new(3));
        for _ in 0..3 {
            let countdown = countdown.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                countdown.down();
            });
        }
        countdown.wait();
        assert_eq!(countdown.count(), 0);
    }

    #[test]
    fn async_wait_resolves_after_final_down() {
        let countdown = CountdownEvent::new(1);
        countdown.down();
        interlock_task::block_on(countdown.wait_async());
    }
}
