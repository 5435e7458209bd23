//! One-shot latch (§4.J "Latch"): waits for `parties` arrivals, then opens
//! forever. An [`Latch::abort`] instead marks it permanently broken.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;

use interlock_rt::flag::Flag;
use interlock_task::waiter::Waiter;

use crate::checkpoint::{self, Fairness};
use crate::error::BrokenBarrierError;
use crate::waitqueue::WaitQueue;

/// A barrier that opens exactly once, after `parties` arrivals, and then
/// stays open. See [`super::Barrier`] for a reusable (cyclic) variant.
pub struct Latch {
    parties: usize,
    arrived: AtomicUsize,
    /// `Some(true)` once opened, `Some(false)` once aborted, absent while
    /// still waiting for arrivals.
    reached: Flag<bool>,
    waiters: WaitQueue,
}

impl Latch {
    /// Creates a latch that opens once `parties` callers have
    /// [`Latch::arrive_and_wait`]ed.
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            arrived: AtomicUsize::new(0),
            reached: Flag::new(),
            waiters: WaitQueue::new(),
        }
    }

    /// Total parties this latch waits for.
    #[inline]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Arrivals registered so far.
    #[inline]
    pub fn arrived(&self) -> usize {
        self.arrived.load(Ordering::Acquire)
    }

    /// `true` once opened by the final arrival.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.reached.get() == Some(true)
    }

    /// `true` once [`Latch::abort`] has broken this latch.
    #[inline]
    pub fn is_broken(&self) -> bool {
        self.reached.get() == Some(false)
    }

    fn wake_all(&self) {
        while let Some(waiter) = self.waiters.pop_front() {
            waiter.wake();
        }
    }

    /// Breaks the latch permanently; every current and future waiter
    /// observes [`BrokenBarrierError`] instead of opening.
    pub fn abort(&self) {
        if self.reached.set(false) {
            self.wake_all();
        }
    }

    fn check_reached(&self) -> Result<bool, BrokenBarrierError> {
        match self.reached.get() {
            Some(true) => Ok(true),
            Some(false) => Err(BrokenBarrierError),
            None => Ok(false),
        }
    }

    fn arrive(&self) -> Result<bool, BrokenBarrierError> {
        if self.is_broken() {
            return Err(BrokenBarrierError);
        }
        let count = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= self.parties && self.reached.set(true) {
            self.wake_all();
        }
        self.check_reached()
    }

    fn wait_blocking(&self, timeout: Option<Duration>) -> Result<bool, BrokenBarrierError> {
        if let reached @ Ok(true) | reached @ Err(_) = self.check_reached() {
            checkpoint::checkpoint(Fairness::Configured);
            return reached;
        }

        let waiter = Arc::new(Waiter::green(false));
        self.waiters.push_back(waiter.clone());

        if let reached @ Ok(true) | reached @ Err(_) = self.check_reached() {
            waiter.wake();
            return reached;
        }

        let woken = match timeout {
            Some(duration) => waiter.wait_timeout(duration),
            None => {
                waiter.wait();
                true
            }
        };
        if !woken && waiter.cancel() {
            self.waiters.remove(&waiter);
            return Ok(false);
        }
        self.check_reached()
    }

    /// Registers an arrival and blocks the calling OS thread until every
    /// party has arrived. Returns `Err` if the latch was (or becomes)
    /// broken while waiting.
    pub fn arrive_and_wait(&self) -> Result<(), BrokenBarrierError> {
        self.arrive()?;
        self.wait_blocking(None)?;
        Ok(())
    }

    /// Blocks until the latch opens (or is aborted) without registering an
    /// arrival.
    pub fn wait(&self) -> Result<(), BrokenBarrierError> {
        self.wait_blocking(None).map(|_| ())
    }

    /// Like [`Latch::wait`], giving up after `timeout` (returns `Ok(false)`
    /// on timeout, `Ok(true)` if it opened in time).
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, BrokenBarrierError> {
        self.wait_blocking(Some(timeout))
    }

    async fn wait_async_inner(&self) -> Result<(), BrokenBarrierError> {
        if let reached @ Ok(true) | reached @ Err(_) = self.check_reached() {
            checkpoint::checkpoint_async(Fairness::Configured).await;
            return reached.map(|_| ());
        }

        let waiter = Arc::new(Waiter::asynchronous(false));
        self.waiters.push_back(waiter.clone());

        if let reached @ Ok(true) | reached @ Err(_) = self.check_reached() {
            waiter.wake();
            return reached.map(|_| ());
        }

        let mut cleanup = WaiterCleanup {
            latch: self,
            waiter: waiter.clone(),
            done: false,
        };
        waiter.wait_async().await;
        cleanup.done = true;
        self.check_reached().map(|_| ())
    }

    /// Registers an arrival and suspends the calling task until every
    /// party has arrived.
    pub async fn arrive_and_wait_async(&self) -> Result<(), BrokenBarrierError> {
        self.arrive()?;
        self.wait_async_inner().await
    }

    /// Suspends the calling task until the latch opens (or is aborted)
    /// without registering an arrival.
    pub async fn wait_async(&self) -> Result<(), BrokenBarrierError> {
        self.wait_async_inner().await
    }
}

struct WaiterCleanup<'a> {
    latch: &'a Latch,
    waiter: Arc<Waiter>,
    done: bool,
}

impl Drop for WaiterCleanup<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.waiter.cancel() {
            self.latch.waiters.remove(&self.waiter);
        }
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use alloc::sync::Arc as StdArc;

    #[test]
    fn opens_after_all_parties_arrive() {
        let latch = StdArc::new(Latch::new(3));
        let handles: alloc::vec::Vec<_> = (0..3)
            .map(|_| {
                let latch = latch.clone();
                std::thread::spawn(move || latch.arrive_and_wait())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert!(latch.is_set());
    }

    #[test]
    fn wait_without_arriving_never_counts() {
        let latch = Latch::new(1);
        assert_eq!(latch.wait_timeout(Duration::from_millis(5)), Ok(false));
        assert_eq!(latch.arrived(), 0);
    }

    #[test]
    fn abort_breaks_current_and_future_waiters() {
        let latch = Latch::new(2);
        latch.abort();
        assert!(latch.is_broken());
        assert_eq!(latch.arrive_and_wait(), Err(BrokenBarrierError));
        assert_eq!(latch.wait(), Err(BrokenBarrierError));
    }

    #[test]
    fn abort_wakes_parked_waiters() {
        let latch = StdArc::new(Latch::new(2));
        let latch2 = latch.clone();
        let handle = std::thread::spawn(move || latch2.arrive_and_wait());
        std::thread::sleep(Duration::from_millis(10));
        latch.abort();
        assert_eq!(handle.join().unwrap(), Err(BrokenBarrierError));
    }

    #[test]
    fn async_arrive_and_wait_resolves() {
        let latch = Latch::new(1);
        interlock_task::block_on(async { latch.arrive_and_wait_async().await }).unwrap();
    }
}
