//! Construction errors.
//!
//! Full and empty are not errors: `try_push` hands the value back and
//! `try_pop` returns `None`. The only hard failure is asking for a ring that
//! cannot exist.

use thiserror::Error;

/// Reasons a ring buffer cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A ring must hold at least one element.
    #[error("ring capacity must be at least 1")]
    ZeroCapacity,
    /// `capacity + 1` slots do not fit in the address space.
    #[error("ring capacity {capacity} is too large to allocate")]
    CapacityOverflow {
        /// The requested usable capacity.
        capacity: usize,
    },
}
