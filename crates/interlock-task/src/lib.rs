#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// Compilation config

pub mod cfg {
    pub use interlock_rt::cfg::{std, web};

    // `optional_send!` gates the `?Send` relaxation applied on targets (eg. wasm32)
    // where futures commonly aren't `Send`.
    interlock_cfg::define_alias! {
        #[cfg(target_arch = "wasm32")] => optional_send,
    }
}

// -----------------------------------------------------------------------------
// no_std support

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod cond_send;

// `Waiter`'s async side is backed by `atomic-waker`, only pulled in under
// `std` (see Cargo.toml); the `web` feature builds on `futures-lite`/
// `async-task` alone and has no use for the blocking green side anyway.
#[cfg(feature = "std")]
pub mod waiter;

#[cfg(feature = "testing")]
pub mod mini_executor;

// -----------------------------------------------------------------------------
// Top-Level Exports

/// Blocks on the supplied `future`.
///
/// This implementation will busy-wait until it is completed. It exists for
/// the test harness and for callers with no async runtime of their own;
/// production code driven by `tokio` or another runtime never needs it, and
/// this crate never calls it internally.
/// Consider enabling the `async-io` or `futures-lite` features.
#[cfg(feature = "testing")]
pub fn block_on<T>(future: impl Future<Output = T>) -> T {
    use core::task::{Context, Poll};

    // Pin the future on the stack.
    let mut future = core::pin::pin!(future);

    // We don't care about the waker as we're just going to poll as fast as possible.
    let cx = &mut Context::from_waker(core::task::Waker::noop());

    // Keep polling until the future is ready.
    loop {
        match future.as_mut().poll(cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => core::hint::spin_loop(),
        }
    }
}
