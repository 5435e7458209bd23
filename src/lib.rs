//! Universal synchronization primitives shared between OS threads and async
//! tasks (currently `tokio`, plus whatever a caller registers via
//! [`interlock_rt::detect::register_probe`]).
//!
//! Every primitive exposes the same operation under up to four names,
//! depending on what makes sense for it: `try_*` (non-blocking), a bare
//! blocking call (OS thread), `*_timeout` (OS thread, bounded), and
//! `*_async` (suspends the calling task instead of blocking its thread).
//! All four ultimately funnel through one rendezvous object,
//! [`interlock_task::waiter::Waiter`], so a release on one side always wakes
//! whichever side is actually waiting.
//!
//! - [`semaphore`] — the counting semaphore every other primitive builds on.
//! - [`lock`] — plain, bounded, owner-tracking, and reentrant mutexes.
//! - [`limiter`] — a semaphore with per-task borrow accounting.
//! - [`event`] — one-shot and resettable events, and a countdown latch.
//! - [`barrier`] — a one-shot latch and a cyclic barrier.
//! - [`condition`] — a condition variable generic over the lock it guards.
//! - [`queue`] — an unbounded queue and a bounded FIFO/LIFO/priority queue.
//! - [`guard`] — a single-occupancy resource guard.
//!
//! [`checkpoint`], [`config`], [`error`], and [`task_id`] are supporting
//! infrastructure shared by all of the above.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;

pub mod barrier;
pub mod checkpoint;
pub mod condition;
pub mod config;
pub mod error;
pub mod event;
pub mod guard;
pub mod limiter;
pub mod lock;
pub mod queue;
pub mod rt_integration;
pub mod semaphore;
pub mod task_id;
pub mod waitqueue;

pub use interlock_cfg as cfg;
pub use interlock_rt as rt;
pub use interlock_task as task;
