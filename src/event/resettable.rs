//! Resettable event (§4.I "REvent"): like [`super::Event`], but
//! [`REvent::clear`] can un-set it.
//!
//! A waiter captures the generation active at enqueue time and is woken by
//! any `set()` at or after that generation (the same ticket/deadline idiom
//! [`crate::condition::Condition`] uses for `notify`), so a `set()` racing
//! a concurrent `clear()` can never strand a waiter that registered before
//! it.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use interlock_rt::flag::Flag;
use interlock_rt::sync::Mutex;
use interlock_task::waiter::Waiter;

use crate::checkpoint::{self, Fairness};

struct Entry {
    waiter: Arc<Waiter>,
    ticket: u64,
}

/// A set/clear flag with a waiter queue (§4.I).
pub struct REvent {
    /// Holds the generation number at which the event was last set, absent
    /// while unset.
    flag: Flag<u64>,
    next_ticket: AtomicU64,
    waiters: Mutex<VecDeque<Entry>>,
}

impl REvent {
    /// Creates an unset event.
    pub fn new() -> Self {
        Self {
            flag: Flag::new(),
            next_ticket: AtomicU64::new(0),
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// `true` while set.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.is_set()
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

    /// Sets the event, waking every waiter registered at or before the new
    /// generation. Idempotent while already set.
    pub fn set(&self) {
        let generation = self.next_ticket.fetch_add(1, Ordering::AcqRel) + 1;
        if self.flag.set(generation) {
            self.wake_up_to(generation);
        }
    }

    /// Un-sets the event. Waiters already woken stay woken; new waiters
    /// must wait for a subsequent [`REvent::set`].
    pub fn clear(&self) {
        self.flag.clear();
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

    /// Blocks the calling OS thread until the event is set.
    pub fn wait(&self) {
        self.wait_blocking(None);
    }

    /// Like [`REvent::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_blocking(Some(timeout))
    }

    /// Suspends the calling task until the event is set.
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

impl Default for REvent {
    fn default() -> Self {
        Self::new()
    }
}

struct WaiterCleanup<'a> {
    event: &'a REvent,
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
    fn clear_then_wait_blocks_until_next_set() {
        let event = REvent::new();
        event.set();
        event.clear();
        assert!(!event.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn waiter_registered_before_set_is_woken_even_after_immediate_clear() {
        let event = StdArc::new(REvent::new());
        let event2 = event.clone();
        let handle = std::thread::spawn(move || event2.wait_timeout(Duration::from_millis(500)));

        std::thread::sleep(Duration::from_millis(10));
        event.set();
        event.clear();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn set_clear_set_wakes_each_cycle() {
        let event = REvent::new();
        event.set();
        assert!(event.is_set());
        event.clear();
        assert!(!event.is_set());
        event.set();
        assert!(event.is_set());
    }

    #[test]
    fn async_wait_resolves_after_set() {
        let event = REvent::new();
        event.set();
        interlock_task::block_on(event.wait_async());
    }
}
