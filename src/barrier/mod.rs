//! Barrier family (component J, §4.J): a one-shot [`Latch`] and a reusable
//! [`Barrier`].

mod cyclic;
mod latch;

pub use cyclic::Barrier;
pub use latch::Latch;
