//! Single-threaded synchronization primitives.
//!
//! - [`Deferred`]: settle-once awaitable with optional cancellation

mod deferred;

pub use deferred::Deferred;
