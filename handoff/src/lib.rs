//! Bounded lock-free ring buffer for exactly one producer thread and one
//! consumer thread.
//!
//! ```
//! let (tx, rx) = handoff::channel::<u32>(1024)?;
//!
//! let worker = std::thread::spawn(move || {
//!     for i in 0..100 {
//!         let mut value = i;
//!         while let Err(back) = tx.try_push(value) {
//!             value = back;
//!             std::thread::yield_now();
//!         }
//!     }
//! });
//!
//! let mut sum = 0;
//! for _ in 0..100 {
//!     sum += loop {
//!         match rx.try_pop() {
//!             Some(v) => break v,
//!             None => std::thread::yield_now(),
//!         }
//!     };
//! }
//! worker.join().unwrap();
//! assert_eq!(sum, 4950);
//! # Ok::<(), handoff::Error>(())
//! ```
//!
//! - [`spsc`] - the ring itself and its cache-line padding
//! - [`sync`] - safe `Producer`/`Consumer` handles and optional wait helpers

pub mod error;
pub mod spsc;
pub mod sync;
mod trace;

pub use error::Error;
pub use spsc::{CACHE_LINE, CacheAligned, RingBuffer};
pub use sync::spsc::{Consumer, Producer, channel};
pub use sync::wait::{Backoff, Timeout};
pub use trace::init_tracing;
