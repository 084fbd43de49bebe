//! Producer/consumer handles for in-process (inter-thread) handoff.
//!
//! # Overview
//!
//! - [`Producer`] - Write end (exactly one per ring)
//! - [`Consumer`] - Read end (exactly one per ring)
//! - Lock-free, wait-free: no mutexes, syscalls, or allocation after
//!   construction
//!
//! # Example
//!
//! ```
//! use handoff::sync::spsc;
//!
//! let (producer, consumer) = spsc::channel::<u64>(1024)?;
//!
//! // Producer thread
//! producer.try_push(42).expect("ring full");
//!
//! // Consumer thread
//! assert_eq!(consumer.try_pop(), Some(42));
//! # Ok::<(), handoff::Error>(())
//! ```
//!
//! Neither handle can be cloned or shared by reference across threads, so
//! the single-producer single-consumer discipline the ring relies on holds
//! by construction.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::error::Error;
use crate::spsc::RingBuffer;
use crate::spsc::primitives::{Arc, AtomicUsize, Ordering};

/// Marker type to opt out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// State shared by the two handles.
struct Shared<T> {
    ring: RingBuffer<T>,

    /// Handles still alive: 2 until one end drops.
    ///
    /// Each handle decrements with Release on drop. A handle that loads 1
    /// with Acquire sees everything its peer did before dropping, including
    /// the last tail or head store.
    live: AtomicUsize,
}

/// Write end of the ring.
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`] or [`Clone`]:
/// - Can move to another thread
/// - Cannot be shared, so `try_push` has exactly one caller
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    _unsync: PhantomUnsync,
}

/// Read end of the ring.
///
/// See [`Producer`] for thread safety details (same semantics apply).
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    _unsync: PhantomUnsync,
}

/// Creates a ring holding up to `capacity` values and splits it.
///
/// # Errors
///
/// Same as [`RingBuffer::new`].
///
/// # Example
///
/// ```
/// use handoff::sync::spsc;
///
/// let (tx, rx) = spsc::channel::<String>(16).unwrap();
///
/// tx.try_push("hello".to_string()).unwrap();
/// assert_eq!(rx.try_pop(), Some("hello".to_string()));
/// ```
pub fn channel<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), Error> {
    Ok(RingBuffer::new(capacity)?.split())
}

impl<T: Send> RingBuffer<T> {
    /// Splits the ring into its producer and consumer ends.
    ///
    /// The ring is freed when both ends have been dropped.
    #[must_use]
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let shared = Arc::new(Shared {
            ring: self,
            live: AtomicUsize::new(2),
        });

        let producer = Producer {
            shared: Arc::clone(&shared),
            _unsync: PhantomData,
        };

        let consumer = Consumer {
            shared,
            _unsync: PhantomData,
        };

        (producer, consumer)
    }
}

impl<T> Shared<T> {
    /// Called by a live handle: whether the other one has been dropped.
    fn peer_dropped(&self) -> bool {
        self.live.load(Ordering::Acquire) == 1
    }

    fn release_handle(&self) {
        self.live.fetch_sub(1, Ordering::Release);
    }
}

impl<T: Send> Producer<T> {
    /// Attempts to push a value (wait-free).
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` if the ring is full, allowing retry.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        // SAFETY: Producer is neither Clone nor Sync, so this is the only
        // thread pushing to the ring.
        unsafe { self.shared.ring.try_push(value) }
    }

    /// Maximum number of values the ring holds at once.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Values currently queued. Never understates from this side: the
    /// consumer can only make room concurrently, never fill it.
    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    /// Whether the ring is currently empty.
    pub fn is_empty(&self) -> bool {
        self.shared.ring.is_empty()
    }

    /// Whether a push would fail right now.
    pub fn is_full(&self) -> bool {
        self.shared.ring.is_full()
    }

    /// Whether the consumer has been dropped; nothing pushed from now on
    /// will ever be read.
    pub fn is_abandoned(&self) -> bool {
        self.shared.peer_dropped()
    }
}

impl<T: Send> Consumer<T> {
    /// Attempts to pop a value (wait-free).
    ///
    /// Returns `None` if the ring is empty.
    #[inline]
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        // SAFETY: Consumer is neither Clone nor Sync, so this is the only
        // thread popping from the ring.
        unsafe { self.shared.ring.try_pop() }
    }

    /// Maximum number of values the ring holds at once.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Values currently queued. Never overstates from this side: the
    /// producer can only add concurrently.
    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    /// Whether the ring is currently empty.
    pub fn is_empty(&self) -> bool {
        self.shared.ring.is_empty()
    }

    /// Whether the ring is currently full.
    pub fn is_full(&self) -> bool {
        self.shared.ring.is_full()
    }

    /// Whether the producer has been dropped.
    ///
    /// Once this returns `true`, every value the producer pushed is
    /// visible: drain with [`try_pop`](Self::try_pop) until `None` and stop.
    pub fn is_abandoned(&self) -> bool {
        self.shared.peer_dropped()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.shared.release_handle();
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.shared.release_handle();
    }
}

impl<T> std::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("ring", &self.shared.ring)
            .finish()
    }
}

impl<T> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("ring", &self.shared.ring)
            .finish()
    }
}
