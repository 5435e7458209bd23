//! One-shot event (§4.I "Event"): a monotonic set flag plus a waiter queue.
//! Once set, stays set forever; see [`super::REvent`] for a resettable
//! variant.

use alloc::sync::Arc;
use core::time::Duration;

use interlock_rt::flag::Flag;
use interlock_task::waiter::Waiter;

use crate::checkpoint::{self, Fairness};
use crate::waitqueue::WaitQueue;

/// A flag that starts unset and, once [`Event::set`], stays set forever.
pub struct Event {
    flag: Flag<()>,
    waiters: WaitQueue,
}

impl Event {
    /// Creates an unset event.
    pub fn new() -> Self {
        Self {
            flag: Flag::new(),
            waiters: WaitQueue::new(),
        }
    }

    /// `true` once [`Event::set`] has been called.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.is_set()
    }

    /// Sets the event, waking every waiter registered so far. Idempotent:
    /// a no-op if already set.
    pub fn set(&self) {
        if self.flag.set(()) {
            while let Some(waiter) = self.waiters.pop_front() {
                waiter.wake();
            }
        }
    }

    fn wait_blocking(&self, timeout: Option<Duration>) -> bool {
        if self.is_set() {
            checkpoint::checkpoint(Fairness::Configured);
            return true;
        }

        let waiter = Arc::new(Waiter::green(false));
        self.waiters.push_back(waiter.clone());

        // Re-check after enqueue: closes the race where `set` ran between
        // our first check and registering as a waiter.
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
            self.waiters.remove(&waiter);
            false
        } else {
            // A concurrent `set` claimed us between the timeout firing and
            // our cancel attempt.
            true
        }
    }

    /// Blocks the calling OS thread until the event is set. Always
    /// eventually returns (no timeout).
    pub fn wait(&self) {
        self.wait_blocking(None);
    }

    /// Like [`Event::wait`], giving up (returning `false`) after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_blocking(Some(timeout))
    }

    /// Suspends the calling task until the event is set.
    pub async fn wait_async(&self) {
        if self.is_set() {
            checkpoint::checkpoint_async(Fairness::Configured).await;
            return;
        }

        let waiter = Arc::new(Waiter::asynchronous(false));
        self.waiters.push_back(waiter.clone());

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

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

struct WaiterCleanup<'a> {
    event: &'a Event,
    waiter: Arc<Waiter>,
    done: bool,
}

impl Drop for WaiterCleanup<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.waiter.cancel() {
            self.event.waiters.remove(&self.waiter);
        }
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use alloc::sync::Arc as StdArc;

    #[test]
    fn wait_returns_immediately_once_set() {
        let event = Event::new();
        event.set();
        assert!(event.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn blocking_wait_wakes_on_set() {
        let event = StdArc::new(Event::new());
        let event2 = event.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            event2.set();
        });
        event.wait();
        assert!(event.is_set());
    }

    #[test]
    fn timeout_without_set_fails() {
        let event = Event::new();
        assert!(!event.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn set_is_idempotent_and_wakes_every_waiter() {
        let event = StdArc::new(Event::new());
        let waiters: alloc::vec::Vec<_> = (0..4)
            .map(|_| {
                let event = event.clone();
                std::thread::spawn(move || event.wait_timeout(Duration::from_millis(500)))
            })
            .collect();
        std::thread::sleep(Duration::from_millis(10));
        event.set();
        event.set();
        for handle in waiters {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn async_wait_resolves_after_set() {
        let event = Event::new();
        event.set();
        interlock_task::block_on(event.wait_async());
    }
}
