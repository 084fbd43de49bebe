//! Core SPSC (Single-Producer Single-Consumer) ring buffer.
//!
//! - [`RingBuffer`] - fixed-capacity storage plus the two-index protocol
//! - [`CacheAligned`] - keeps each hot index on its own cache line
//!
//! The ring's `try_push`/`try_pop` are `unsafe` because the caller must
//! uphold the role discipline. [`crate::sync::spsc`] wraps them in handles
//! that make the discipline a type-level guarantee.

mod padded;
mod ring;

pub use padded::{CACHE_LINE, CacheAligned};
pub use ring::RingBuffer;

/// Atomics, `Arc`, and slot cells: `std` normally, `loom` under `--cfg loom`
/// so the model checker sees every slot, index, and handle-count access.
pub(crate) mod primitives {
    #[cfg(not(loom))]
    pub(crate) use std::sync::Arc;
    #[cfg(not(loom))]
    pub(crate) use std::sync::atomic::{AtomicUsize, Ordering};

    #[cfg(loom)]
    pub(crate) use loom::cell::UnsafeCell;
    #[cfg(loom)]
    pub(crate) use loom::sync::Arc;
    #[cfg(loom)]
    pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};

    /// `std::cell::UnsafeCell` with loom's closure-based access API.
    ///
    /// Never constructed directly: slots are allocated uninitialized in bulk.
    #[cfg(not(loom))]
    #[allow(dead_code)]
    #[repr(transparent)]
    pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

    #[cfg(not(loom))]
    impl<T> UnsafeCell<T> {
        #[inline(always)]
        pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
            f(self.0.get())
        }

        #[inline(always)]
        pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
            f(self.0.get())
        }
    }
}
