//! Cyclic (reusable) barrier (§4.J "Cyclic Barrier"): `parties` callers
//! rendezvous, then the barrier automatically re-arms for the next
//! generation. See [`super::Latch`] for a one-shot variant.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::time::Duration;

use interlock_rt::sync::Mutex;
use interlock_task::waiter::Waiter;

use crate::checkpoint::{self, Fairness};
use crate::error::BrokenBarrierError;

/// A token handed to every party of one generation; filled in and the
/// associated waiter woken once the generation completes (or breaks).
struct Token {
    waiter: Arc<Waiter>,
    /// Index this party was assigned within its generation, `0..parties`.
    index: usize,
    /// Generation this token belongs to; stale once the barrier has moved
    /// past it without this party's involvement (never happens under
    /// correct use, kept for a debug assertion).
    generation: u64,
    broken: bool,
}

struct State {
    /// Tokens of the generation currently filling, in arrival order.
    waiting: VecDeque<Arc<Mutex<Token>>>,
    generation: u64,
    broken: bool,
}

/// A reusable rendezvous point for a fixed number of parties.
///
/// Unlike [`super::Latch`], a `Barrier` cycles: once `parties` callers have
/// called [`Barrier::wait`], all are released together and the barrier
/// immediately starts counting the next generation. A cancellation or
/// explicit [`Barrier::reset`] mid-cycle breaks the current generation for
/// every party still parked in it; later generations are unaffected.
pub struct Barrier {
    parties: usize,
    state: Mutex<State>,
}

impl Barrier {
    /// Creates a reusable barrier for `parties` callers. Panics if
    /// `parties` is zero.
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "a barrier needs at least one party");
        Self {
            parties,
            state: Mutex::new(State {
                waiting: VecDeque::new(),
                generation: 0,
                broken: false,
            }),
        }
    }

    /// Total parties this barrier waits for each generation.
    #[inline]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Current generation number, incremented every time the barrier
    /// completes (or breaks) a rendezvous.
    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).generation
    }

    /// Parties currently parked in the active generation.
    pub fn waiting(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).waiting.len()
    }

    /// `true` if the active generation has been broken (by a cancelled
    /// waiter or an explicit [`Barrier::reset`]) and has not yet been
    /// superseded.
    pub fn is_broken(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).broken
    }

    fn break_generation(guard: &mut State) -> alloc::vec::Vec<Arc<Mutex<Token>>> {
        guard.broken = true;
        guard.generation += 1;
        core::mem::take(&mut guard.waiting).into_iter().collect()
    }

    /// Breaks the current generation, waking every party parked in it with
    /// [`BrokenBarrierError`]. The next generation starts fresh and is
    /// unaffected.
    pub fn reset(&self) {
        let parked = {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if guard.broken {
                alloc::vec::Vec::new()
            } else {
                #[cfg(feature = "tracing")]
                let generation = guard.generation;
                let parked = Self::break_generation(&mut guard);
                #[cfg(feature = "tracing")]
                tracing::debug!(generation, parked = parked.len(), "barrier broken");
                parked
            }
        };
        for token in parked {
            let mut token = token.lock().unwrap_or_else(|e| e.into_inner());
            token.broken = true;
            token.waiter.wake();
        }
        // The generation that follows a reset always starts clean.
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.broken = false;
    }

    /// Registers this party's arrival and returns the token it should wait
    /// on, along with the index assigned within this generation.
    fn arrive(&self, waiter: Arc<Waiter>) -> Result<(Arc<Mutex<Token>>, bool), BrokenBarrierError> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if guard.broken {
            return Err(BrokenBarrierError);
        }
        let index = guard.waiting.len();
        let token = Arc::new(Mutex::new(Token {
            waiter,
            index,
            generation: guard.generation,
            broken: false,
        }));
        guard.waiting.push_back(token.clone());

        if guard.waiting.len() < self.parties {
            return Ok((token, false));
        }

        // Last arrival of this generation: release every party and re-arm.
        let generation = guard.generation;
        guard.generation += 1;
        let released: alloc::vec::Vec<_> = core::mem::take(&mut guard.waiting).into_iter().collect();
        drop(guard);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            generation,
            parties = self.parties,
            next_generation = generation + 1,
            "barrier generation complete"
        );

        for released_token in &released {
            let token_guard = released_token.lock().unwrap_or_else(|e| e.into_inner());
            debug_assert_eq!(token_guard.generation, generation);
            drop(token_guard);
            released_token
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .waiter
                .wake();
        }
        Ok((token, true))
    }

    fn outcome(token: &Arc<Mutex<Token>>) -> Result<usize, BrokenBarrierError> {
        let guard = token.lock().unwrap_or_else(|e| e.into_inner());
        if guard.broken {
            Err(BrokenBarrierError)
        } else {
            Ok(guard.index)
        }
    }

    /// Blocks the calling OS thread until `parties` callers have arrived,
    /// returning this party's index within the completed generation (`0`
    /// identifies the party whose arrival completed it). Every party
    /// receives `Err` if the generation breaks before completing.
    pub fn wait(&self) -> Result<usize, BrokenBarrierError> {
        let waiter = Arc::new(Waiter::green(false));
        let (token, completed) = self.arrive(waiter.clone())?;
        if !completed {
            waiter.wait();
            if waiter.cancel() {
                // Cancelled before anyone released us: break the generation
                // for every other party still parked in it.
                self.reset();
            }
        }
        checkpoint::checkpoint(Fairness::Configured);
        Self::outcome(&token)
    }

    /// Like [`Barrier::wait`], giving up after `timeout`. A timed-out party
    /// breaks the generation for every other party still parked in it.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<usize, BrokenBarrierError> {
        let waiter = Arc::new(Waiter::green(false));
        let (token, completed) = self.arrive(waiter.clone())?;
        if !completed && !waiter.wait_timeout(timeout) && waiter.cancel() {
            self.reset();
        }
        Self::outcome(&token)
    }

    /// Suspends the calling task until `parties` callers have arrived,
    /// returning this party's index within the completed generation.
    pub async fn wait_async(&self) -> Result<usize, BrokenBarrierError> {
        let waiter = Arc::new(Waiter::asynchronous(false));
        let (token, completed) = self.arrive(waiter.clone())?;
        if !completed {
            let mut cleanup = WaiterCleanup {
                barrier: self,
                waiter: waiter.clone(),
                done: false,
            };
            waiter.wait_async().await;
            cleanup.done = true;
        }
        checkpoint::checkpoint_async(Fairness::Configured).await;
        Self::outcome(&token)
    }
}

struct WaiterCleanup<'a> {
    barrier: &'a Barrier,
    waiter: Arc<Waiter>,
    done: bool,
}

impl Drop for WaiterCleanup<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.waiter.cancel() {
            self.barrier.reset();
        }
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;
    use alloc::sync::Arc as StdArc;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn releases_all_parties_together() {
        let barrier = StdArc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let barrier = barrier.clone();
                std::thread::spawn(move || barrier.wait())
            })
            .collect();
        let mut indices: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(barrier.generation(), 1);
    }

    #[test]
    fn cycles_to_a_fresh_generation() {
        let barrier = StdArc::new(Barrier::new(2));
        for expected_generation in 1..=3u64 {
            let b1 = barrier.clone();
            let b2 = barrier.clone();
            let h1 = std::thread::spawn(move || b1.wait());
            let h2 = std::thread::spawn(move || b2.wait());
            h1.join().unwrap().unwrap();
            h2.join().unwrap().unwrap();
            assert_eq!(barrier.generation(), expected_generation);
        }
    }

    #[test]
    fn timeout_breaks_the_generation_for_everyone() {
        let barrier = StdArc::new(Barrier::new(2));
        let barrier2 = barrier.clone();
        let handle = std::thread::spawn(move || barrier2.wait_timeout(Duration::from_millis(20)));
        let result = handle.join().unwrap();
        assert_eq!(result, Err(BrokenBarrierError));
    }

    #[test]
    fn explicit_reset_breaks_current_waiters() {
        let barrier = StdArc::new(Barrier::new(2));
        let barrier2 = barrier.clone();
        let handle = std::thread::spawn(move || barrier2.wait());
        std::thread::sleep(Duration::from_millis(10));
        barrier.reset();
        assert_eq!(handle.join().unwrap(), Err(BrokenBarrierError));
    }

    #[test]
    fn single_party_completes_immediately() {
        let barrier = Barrier::new(1);
        assert_eq!(barrier.wait(), Ok(0));
        assert_eq!(barrier.generation(), 1);
    }

    #[test]
    fn s2_three_parties_one_thread_two_async_loops() {
        // Scenario S2: one OS thread and two async tasks, each driven by
        // its own event loop (a separate `block_on` on its own OS thread),
        // all call `wait`; every one must observe the last arrival and
        // return a distinct index in {0, 1, 2}.
        let barrier = StdArc::new(Barrier::new(3));

        let b_thread = barrier.clone();
        let thread_party = std::thread::spawn(move || b_thread.wait());

        let b_loop1 = barrier.clone();
        let loop1 = std::thread::spawn(move || interlock_task::block_on(b_loop1.wait_async()));

        let b_loop2 = barrier.clone();
        let loop2 = std::thread::spawn(move || interlock_task::block_on(b_loop2.wait_async()));

        let mut indices = vec![
            thread_party.join().unwrap().unwrap(),
            loop1.join().unwrap().unwrap(),
            loop2.join().unwrap().unwrap(),
        ];
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(barrier.generation(), 1);
    }
}
