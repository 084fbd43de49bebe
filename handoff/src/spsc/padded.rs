//! Cache-line isolation for independently written values.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Alignment used by [`CacheAligned`], in bytes.
///
/// 128 where the hardware prefetches or coherently tracks line pairs
/// (`x86_64` adjacent-line prefetch, big `aarch64` cores, `powerpc64`), 64
/// everywhere else.
#[cfg(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "powerpc64"
))]
pub const CACHE_LINE: usize = 128;

/// Alignment used by [`CacheAligned`], in bytes.
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "powerpc64"
)))]
pub const CACHE_LINE: usize = 64;

/// Pads and aligns a value to [`CACHE_LINE`] bytes.
///
/// Alignment forces the size up to a multiple of the alignment, so no other
/// value can share a line with the wrapped one. Two threads writing two
/// separate `CacheAligned` values never invalidate each other's line.
#[cfg_attr(
    any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64"
    ),
    repr(C, align(128))
)]
#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64"
    )),
    repr(C, align(64))
)]
#[derive(Default)]
pub struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    /// Wraps `value` in its own cache line.
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CacheAligned<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> From<T> for CacheAligned<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheAligned")
            .field("value", &self.value)
            .finish()
    }
}
