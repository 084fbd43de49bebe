//! Thread-safe handles over the ring buffer.
//!
//! - [`spsc`] - `Producer`/`Consumer` pair that enforces one thread per role
//! - [`wait`] - optional retry helpers for callers that want to wait

pub mod spsc;
pub mod wait;
