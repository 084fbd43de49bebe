//! Retry helpers for callers that want to wait on the ring.
//!
//! The ring itself never waits: `try_push` and `try_pop` return at once.
//! Everything here is built on those two calls and is entirely optional.
//! Pick what suits the workload:
//!
//! - plain spin on [`std::hint::spin_loop`] for lowest latency on pinned cores
//! - [`Backoff`] to spin briefly and then start yielding the time slice
//! - [`Producer::push_blocking`] / [`Consumer::pop_blocking`] to wait with
//!   a deadline

use std::hint;
use std::thread;
use std::time::Duration;

use minstant::Instant;

use super::spsc::{Consumer, Producer};

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

impl Timeout {
    fn deadline(self) -> Option<Instant> {
        match self {
            Self::Infinite => None,
            Self::Duration(d) => Some(Instant::now() + d),
        }
    }
}

/// Exponential spin, then yield.
///
/// Each [`snooze`](Self::snooze) spins `2^step` times until `step` passes
/// the spin limit; from then on it yields to the scheduler instead.
#[derive(Debug, Default, Clone)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;

    /// Starts at the shortest spin.
    pub const fn new() -> Self {
        Self { step: 0 }
    }

    /// Waits a little longer than last time.
    #[inline]
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..1u32 << self.step {
                hint::spin_loop();
            }
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }

    /// Goes back to the shortest spin, typically after progress was made.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Whether snoozing has escalated to yielding.
    pub fn is_yielding(&self) -> bool {
        self.step > Self::SPIN_LIMIT
    }
}

impl<T: Send> Producer<T> {
    /// Retries [`try_push`](Self::try_push) with [`Backoff`] until it
    /// succeeds or the timeout passes.
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` on timeout.
    pub fn push_blocking(&self, mut value: T, timeout: impl Into<Timeout>) -> Result<(), T> {
        let deadline = timeout.into().deadline();
        let mut backoff = Backoff::new();
        loop {
            match self.try_push(value) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    value = returned;
                    if let Some(dl) = deadline
                        && Instant::now() > dl
                    {
                        return Err(value);
                    }
                    backoff.snooze();
                }
            }
        }
    }
}

impl<T: Send> Consumer<T> {
    /// Retries [`try_pop`](Self::try_pop) with [`Backoff`] until a value
    /// arrives or the timeout passes.
    ///
    /// Returns `None` on timeout.
    #[must_use]
    pub fn pop_blocking(&self, timeout: impl Into<Timeout>) -> Option<T> {
        let deadline = timeout.into().deadline();
        let mut backoff = Backoff::new();
        loop {
            if let Some(value) = self.try_pop() {
                return Some(value);
            }
            if let Some(dl) = deadline
                && Instant::now() > dl
            {
                return None;
            }
            backoff.snooze();
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::sync::spsc::channel;

    #[test]
    fn test_backoff_escalates_and_resets() {
        let mut backoff = Backoff::new();
        for _ in 0..=Backoff::SPIN_LIMIT {
            assert!(!backoff.is_yielding());
            backoff.snooze();
        }
        assert!(backoff.is_yielding());
        backoff.snooze();
        assert!(backoff.is_yielding());

        backoff.reset();
        assert!(!backoff.is_yielding());
    }

    #[test]
    fn test_pop_blocking_times_out_on_empty() {
        let (_producer, consumer) = channel::<u32>(4).unwrap();
        let start = Instant::now();
        assert_eq!(consumer.pop_blocking(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_push_blocking_times_out_on_full() {
        let (producer, _consumer) = channel::<u32>(1).unwrap();
        producer.try_push(1).unwrap();
        assert_eq!(producer.push_blocking(2, Duration::from_millis(10)), Err(2));
    }

    #[test]
    fn test_blocking_handoff_across_threads() {
        let (producer, consumer) = channel::<u64>(2).unwrap();

        let handle = std::thread::spawn(move || {
            for i in 0..1_000 {
                producer.push_blocking(i, Timeout::Infinite).unwrap();
            }
        });

        for i in 0..1_000 {
            assert_eq!(consumer.pop_blocking(Timeout::Infinite), Some(i));
        }
        handle.join().unwrap();
    }
}
