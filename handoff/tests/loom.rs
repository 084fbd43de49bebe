//! Exhaustive interleaving checks of the push/pop protocol.
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test --release --test loom
//! ```

#![cfg(loom)]

use handoff::channel;
use loom::thread;

/// Two values through a capacity-1 ring: every slot is reused and both
/// indices wrap.
#[test]
fn loom_fifo_min_capacity() {
    loom::model(|| {
        let (producer, consumer) = channel::<u32>(1).unwrap();

        let producer_thread = thread::spawn(move || {
            for i in 0..2 {
                let mut value = i;
                while let Err(back) = producer.try_push(value) {
                    value = back;
                    thread::yield_now();
                }
            }
        });

        for expected in 0..2 {
            loop {
                if let Some(value) = consumer.try_pop() {
                    assert_eq!(value, expected);
                    break;
                }
                thread::yield_now();
            }
        }

        producer_thread.join().unwrap();
        assert_eq!(consumer.try_pop(), None);
    });
}

/// Producer fills the ring and must observe the consumer's release of a
/// slot before reusing it.
#[test]
fn loom_full_retry() {
    loom::model(|| {
        let (producer, consumer) = channel::<String>(2).unwrap();

        let producer_thread = thread::spawn(move || {
            for i in 0..3 {
                let mut value = i.to_string();
                while let Err(back) = producer.try_push(value) {
                    value = back;
                    thread::yield_now();
                }
            }
        });

        let mut received = Vec::new();
        while received.len() < 3 {
            match consumer.try_pop() {
                Some(value) => received.push(value),
                None => thread::yield_now(),
            }
        }

        producer_thread.join().unwrap();
        assert_eq!(received, ["0", "1", "2"]);
    });
}

/// The consumer learns the producer is gone only through `is_abandoned`
/// and must still receive every value pushed before the drop.
#[test]
fn loom_drain_after_abandon() {
    loom::model(|| {
        let (producer, consumer) = channel::<u32>(2).unwrap();

        let producer_thread = thread::spawn(move || {
            producer.try_push(10).unwrap();
            producer.try_push(20).unwrap();
        });

        let mut received = Vec::new();
        loop {
            if let Some(value) = consumer.try_pop() {
                received.push(value);
            } else if consumer.is_abandoned() {
                while let Some(value) = consumer.try_pop() {
                    received.push(value);
                }
                break;
            } else {
                thread::yield_now();
            }
        }

        producer_thread.join().unwrap();
        assert_eq!(received, [10, 20]);
    });
}
