//! Synchronization support for the stream fabric
//!
//! The fabric keeps its fast paths lock-free; the only blocking primitive is
//! the bounded timed wait in [`Waiter`], used while a pool or queue is
//! temporarily full or empty.

pub mod waiter;

pub use waiter::Waiter;
