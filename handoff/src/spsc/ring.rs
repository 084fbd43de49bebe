//! Bounded lock-free SPSC ring buffer.
//!
//! # Layout
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │ head            (own cache line)       │  written by consumer
//! ├────────────────────────────────────────┤
//! │ tail            (own cache line)       │  written by producer
//! ├────────────────────────────────────────┤
//! │ slots: Box<[Slot<T>]>  (capacity + 1)  │  separate heap allocation
//! └────────────────────────────────────────┘
//! ```
//!
//! One slot is always left unused so that `head == tail` means empty and
//! `tail + 1 == head` (mod slot count) means full, with no element counter.
//!
//! # Ordering
//!
//! ```text
//! producer: write slot[tail], Release-store tail  ->  consumer: Acquire-load tail, read slot
//! consumer: read slot[head],  Release-store head  ->  producer: Acquire-load head, write slot
//! ```
//!
//! Each side loads its own index `Relaxed` (it is the only writer) and the
//! peer's index `Acquire`. Each index has exactly one writer, so a plain
//! store publishes it; there is no compare-and-swap anywhere.
//!
//! # Safety
//!
//! [`RingBuffer::try_push`] and [`RingBuffer::try_pop`] are `unsafe`: at most
//! one thread may push and at most one thread may pop at any time. Use
//! [`RingBuffer::split`] to get handles that enforce this.

use std::fmt;
use std::mem::{MaybeUninit, size_of};

use super::primitives::{AtomicUsize, Ordering, UnsafeCell};
use super::padded::CacheAligned;
use crate::error::Error;
use crate::trace::{debug, trace};

/// A single storage cell.
///
/// Initialized iff its index lies in `[head, tail)`.
#[repr(transparent)]
struct Slot<T>(UnsafeCell<MaybeUninit<T>>);

impl<T> Slot<T> {
    /// Allocates `len` empty slots without touching each one.
    #[cfg(not(loom))]
    fn alloc(len: usize) -> Box<[Self]> {
        let slots = Box::<[Self]>::new_uninit_slice(len);
        // SAFETY: Slot<T> is a transparent wrapper (through UnsafeCell) around
        // MaybeUninit<T>, for which uninitialized memory is a valid value.
        unsafe { slots.assume_init() }
    }

    /// loom cells carry tracking state and must be built one by one.
    #[cfg(loom)]
    fn alloc(len: usize) -> Box<[Self]> {
        (0..len)
            .map(|_| Self(UnsafeCell::new(MaybeUninit::uninit())))
            .collect()
    }
}

/// Fixed-capacity queue for exactly one producer and one consumer.
pub struct RingBuffer<T> {
    /// Next slot to read. Written by the consumer, read by the producer.
    head: CacheAligned<AtomicUsize>,

    /// Next slot to write. Written by the producer, read by the consumer.
    tail: CacheAligned<AtomicUsize>,

    /// `capacity + 1` cells; the spare one is the full/empty sentinel.
    slots: Box<[Slot<T>]>,
}

impl<T> RingBuffer<T> {
    /// Allocates a ring that holds up to `capacity` values.
    ///
    /// This is the only allocation the ring ever makes.
    ///
    /// # Errors
    ///
    /// - [`Error::ZeroCapacity`] if `capacity == 0`.
    /// - [`Error::CapacityOverflow`] if `capacity + 1` slots of `T` cannot be
    ///   addressed.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        let len = capacity
            .checked_add(1)
            .filter(|&len| {
                len.checked_mul(size_of::<Slot<T>>())
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or(Error::CapacityOverflow { capacity })?;

        let slots = Slot::<T>::alloc(len);

        debug!(capacity, slots = len, "ring buffer allocated");

        Ok(Self {
            head: CacheAligned::new(AtomicUsize::new(0)),
            tail: CacheAligned::new(AtomicUsize::new(0)),
            slots,
        })
    }

    /// Maximum number of values the ring holds at once.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Advances an index by one slot, wrapping to 0.
    ///
    /// Same result as `(index + 1) % slots.len()` for every valid index,
    /// without the division.
    #[inline]
    fn bump(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    /// Attempts to append `value` at the tail.
    ///
    /// Never blocks. On a full ring the value comes back unchanged in `Err`
    /// and the ring is not touched.
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` if the ring is full.
    ///
    /// # Safety
    ///
    /// No other thread may call `try_push` on this ring concurrently.
    #[inline]
    pub unsafe fn try_push(&self, value: T) -> Result<(), T> {
        // Only this thread writes tail.
        let tail = self.tail.load(Ordering::Relaxed);
        // Pairs with the consumer's Release store in try_pop: every slot
        // before `head` has been fully moved out.
        let head = self.head.load(Ordering::Acquire);

        let next = self.bump(tail);
        if next == head {
            return Err(value);
        }

        // SAFETY: The producer owns slot `tail`:
        // - tail is in [0, len) since it only ever moves through bump()
        // - next != head, so the slot is outside [head, tail) and the consumer
        //   will not read it until the store below publishes it
        // - the caller guarantees no second producer
        self.slots[tail].0.with_mut(|slot| unsafe {
            (*slot).write(value);
        });

        // Publish the slot written above.
        self.tail.store(next, Ordering::Release);

        Ok(())
    }

    /// Attempts to remove the value at the head.
    ///
    /// Never blocks. Returns `None` on an empty ring without touching it.
    ///
    /// # Safety
    ///
    /// No other thread may call `try_pop` on this ring concurrently.
    #[inline]
    pub unsafe fn try_pop(&self) -> Option<T> {
        // Only this thread writes head.
        let head = self.head.load(Ordering::Relaxed);
        // Pairs with the producer's Release store in try_push: the slot at
        // `head` is fully written.
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        // SAFETY: The consumer owns slot `head`:
        // - head is in [0, len) since it only ever moves through bump()
        // - head != tail, so the slot is in [head, tail) and initialized
        // - the producer will not write it until the store below releases it
        // - the caller guarantees no second consumer
        let value = self.slots[head]
            .0
            .with(|slot| unsafe { (*slot).assume_init_read() });

        // Hand the slot back to the producer.
        self.head.store(self.bump(head), Ordering::Release);

        Some(value)
    }

    /// Number of values currently queued.
    ///
    /// The peer may move its index at any moment, so this is a snapshot. See
    /// [`Producer::len`](crate::Producer::len) and
    /// [`Consumer::len`](crate::Consumer::len) for the bound each side gets.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            self.slots.len() - head + tail
        }
    }

    /// Whether no value is queued. Same caveats as [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Whether a push would fail right now. Same caveats as [`len`](Self::len).
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        self.bump(tail) == head
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // `&mut self`: both roles are gone, plain loads see the final state.
        let mut head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);

        let mut dropped = 0usize;
        while head != tail {
            // SAFETY: slots in [head, tail) hold initialized values that
            // nobody else can reach any more.
            self.slots[head]
                .0
                .with_mut(|slot| unsafe { (*slot).assume_init_drop() });
            head = self.bump(head);
            dropped += 1;
        }

        if dropped > 0 {
            trace!(dropped, "dropped values left in ring buffer");
        }
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// SAFETY: RingBuffer owns its values; moving it moves them.
unsafe impl<T: Send> Send for RingBuffer<T> {}

// SAFETY: Shared access only reaches slots through the unsafe try_push /
// try_pop, whose callers guarantee one producer and one consumer. The
// Release/Acquire pairs on head and tail hand each slot between the two.
unsafe impl<T: Send> Sync for RingBuffer<T> {}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    fn push<T>(ring: &RingBuffer<T>, value: T) -> Result<(), T> {
        // SAFETY: single-threaded test, one role at a time.
        unsafe { ring.try_push(value) }
    }

    fn pop<T>(ring: &RingBuffer<T>) -> Option<T> {
        // SAFETY: single-threaded test, one role at a time.
        unsafe { ring.try_pop() }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(RingBuffer::<u64>::new(0).unwrap_err(), Error::ZeroCapacity);
    }

    #[test]
    fn test_capacity_overflow_rejected() {
        assert_eq!(
            RingBuffer::<u64>::new(usize::MAX).unwrap_err(),
            Error::CapacityOverflow {
                capacity: usize::MAX
            }
        );
        assert_eq!(
            RingBuffer::<u64>::new(usize::MAX / 4).unwrap_err(),
            Error::CapacityOverflow {
                capacity: usize::MAX / 4
            }
        );
    }

    #[test]
    fn test_capacity_bound() {
        let ring = RingBuffer::new(5).unwrap();
        assert_eq!(ring.capacity(), 5);

        for i in 0..5 {
            assert!(push(&ring, i).is_ok(), "push {i} should fit");
        }
        assert!(ring.is_full());
        assert_eq!(push(&ring, 99), Err(99));

        assert_eq!(pop(&ring), Some(0));
        assert!(push(&ring, 5).is_ok());
        assert_eq!(push(&ring, 100), Err(100));
    }

    #[test]
    fn test_empty_pop_is_noop() {
        let ring = RingBuffer::<u32>::new(3).unwrap();
        for _ in 0..3 {
            assert_eq!(pop(&ring), None);
            assert!(ring.is_empty());
            assert_eq!(ring.len(), 0);
        }

        push(&ring, 7).unwrap();
        assert_eq!(pop(&ring), Some(7));
        assert_eq!(pop(&ring), None);
    }

    #[test]
    fn test_full_push_is_noop() {
        let ring = RingBuffer::new(2).unwrap();
        push(&ring, 1).unwrap();
        push(&ring, 2).unwrap();

        for rejected in 10..13 {
            assert_eq!(push(&ring, rejected), Err(rejected));
            assert_eq!(ring.len(), 2);
        }

        assert_eq!(pop(&ring), Some(1));
        assert_eq!(pop(&ring), Some(2));
        assert_eq!(pop(&ring), None);
    }

    #[test]
    fn test_wrap_around_preserves_order() {
        let ring = RingBuffer::new(3).unwrap();
        let mut next_out = 0u32;

        // Keep the ring partly full so head and tail wrap at different times.
        for i in 0..10_000u32 {
            while push(&ring, i).is_err() {
                assert_eq!(pop(&ring), Some(next_out));
                next_out += 1;
            }
        }
        while let Some(value) = pop(&ring) {
            assert_eq!(value, next_out);
            next_out += 1;
        }
        assert_eq!(next_out, 10_000);
    }

    #[test]
    fn test_minimum_capacity_alternates() {
        let ring = RingBuffer::new(1).unwrap();
        assert_eq!(ring.capacity(), 1);

        for i in 0..10 {
            assert!(push(&ring, i).is_ok());
            assert_eq!(push(&ring, i + 100), Err(i + 100));
            assert_eq!(pop(&ring), Some(i));
            assert_eq!(pop(&ring), None);
        }
    }

    #[test]
    fn test_len_across_wrap() {
        let ring = RingBuffer::new(4).unwrap();
        for i in 0..4 {
            push(&ring, i).unwrap();
        }
        pop(&ring);
        pop(&ring);
        pop(&ring);
        push(&ring, 4).unwrap();
        push(&ring, 5).unwrap();

        // tail has wrapped past the end of the slot array.
        assert_eq!(ring.len(), 3);
        assert!(!ring.is_empty());
        assert!(!ring.is_full());
    }

    #[test]
    fn test_drop_releases_queued_values() {
        struct Counted(Arc<StdAtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }

        let drops = Arc::new(StdAtomicUsize::new(0));
        {
            let ring = RingBuffer::new(4).unwrap();
            for _ in 0..4 {
                assert!(push(&ring, Counted(Arc::clone(&drops))).is_ok());
            }
            // Rejected value comes back to us and is dropped here.
            drop(push(&ring, Counted(Arc::clone(&drops))));
            assert_eq!(drops.load(std::sync::atomic::Ordering::Relaxed), 1);

            drop(pop(&ring));
            assert_eq!(drops.load(std::sync::atomic::Ordering::Relaxed), 2);
        }
        // Three were still queued.
        assert_eq!(drops.load(std::sync::atomic::Ordering::Relaxed), 5);
    }

    #[test]
    fn test_indices_do_not_share_a_line() {
        let ring = RingBuffer::<u8>::new(1).unwrap();
        let head = &*ring.head as *const _ as usize;
        let tail = &*ring.tail as *const _ as usize;
        assert!(head.abs_diff(tail) >= crate::spsc::CACHE_LINE);
    }

    #[test]
    fn test_zero_sized_values_at_huge_capacity() {
        // No per-slot work: this must return at once.
        let ring = RingBuffer::<()>::new(usize::MAX - 1).unwrap();
        assert_eq!(ring.capacity(), usize::MAX - 1);

        assert!(push(&ring, ()).is_ok());
        assert!(push(&ring, ()).is_ok());
        assert_eq!(ring.len(), 2);
        assert_eq!(pop(&ring), Some(()));
        assert_eq!(ring.len(), 1);
        assert!(!ring.is_full());

        assert_eq!(
            RingBuffer::<()>::new(usize::MAX).unwrap_err(),
            Error::CapacityOverflow {
                capacity: usize::MAX
            }
        );
    }

    #[test]
    fn test_zero_sized_values() {
        let ring = RingBuffer::new(2).unwrap();
        assert!(push(&ring, ()).is_ok());
        assert!(push(&ring, ()).is_ok());
        assert_eq!(push(&ring, ()), Err(()));
        assert_eq!(pop(&ring), Some(()));
        assert_eq!(ring.len(), 1);
    }
}
