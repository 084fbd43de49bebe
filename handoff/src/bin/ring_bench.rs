//! Ring buffer throughput benchmark with a checksum.
//!
//! One producer pushes `0..count`, one consumer pops `count` values and sums
//! them. Each run prints its wall time and sum; the mean is printed last. A
//! sum other than `count * (count - 1) / 2` aborts with a non-zero exit.
//!
//! Usage:
//!     cargo run --release --features bench --bin ring_bench
//!
//! Environment variables:
//!     HANDOFF_COUNT=10000000   Values per run
//!     HANDOFF_CAPACITY=1024    Ring capacity
//!     HANDOFF_RUNS=3           Number of runs to average
//!     HANDOFF_WAIT=yield       Retry policy: yield | spin | backoff
//!     PRODUCER_CPU=0           Pin producer to a CPU (default: unpinned)
//!     CONSUMER_CPU=2           Pin consumer to a CPU (default: unpinned)
//!     RUST_LOG=handoff=debug   Log filter (with `--features tracing`)

use std::env;
use std::hint;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use handoff::{Backoff, Consumer, Producer};
use thiserror::Error;

#[derive(Debug, Error)]
enum ConfigError {
    #[error("{var}={value:?} is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("ring construction failed: {0}")]
    Ring(#[from] handoff::Error),
}

/// How each side retries a failed `try_push` / `try_pop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Yield,
    Spin,
    Backoff,
}

impl FromStr for Wait {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "yield" => Ok(Self::Yield),
            "spin" => Ok(Self::Spin),
            "backoff" => Ok(Self::Backoff),
            _ => Err(()),
        }
    }
}

/// Retry state for one thread.
struct Waiter {
    wait: Wait,
    backoff: Backoff,
}

impl Waiter {
    fn new(wait: Wait) -> Self {
        Self {
            wait,
            backoff: Backoff::new(),
        }
    }

    #[inline]
    fn idle(&mut self) {
        match self.wait {
            Wait::Yield => thread::yield_now(),
            Wait::Spin => hint::spin_loop(),
            Wait::Backoff => self.backoff.snooze(),
        }
    }

    #[inline]
    fn progressed(&mut self) {
        if self.wait == Wait::Backoff {
            self.backoff.reset();
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BenchConfig {
    count: u64,
    capacity: usize,
    runs: u32,
    wait: Wait,
    producer_cpu: Option<usize>,
    consumer_cpu: Option<usize>,
}

fn parse_var<T: FromStr>(var: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var,
                value,
                expected,
            }),
        Err(_) => Ok(None),
    }
}

impl BenchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            count: parse_var("HANDOFF_COUNT", "value count")?.unwrap_or(10_000_000),
            capacity: parse_var("HANDOFF_CAPACITY", "capacity")?.unwrap_or(1024),
            runs: parse_var("HANDOFF_RUNS", "run count")?.unwrap_or(3).max(1),
            wait: parse_var("HANDOFF_WAIT", "wait policy (yield, spin, backoff)")?
                .unwrap_or(Wait::Yield),
            producer_cpu: parse_var("PRODUCER_CPU", "CPU id")?,
            consumer_cpu: parse_var("CONSUMER_CPU", "CPU id")?,
        })
    }

    /// `0 + 1 + ... + (count - 1)`, wrapped to 64 bits like the consumer's
    /// running sum.
    fn expected_sum(&self) -> u64 {
        let n = u128::from(self.count);
        (n * n.saturating_sub(1) / 2) as u64
    }
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

fn produce(producer: Producer<u64>, config: BenchConfig) {
    let mut waiter = Waiter::new(config.wait);
    for i in 0..config.count {
        let mut value = i;
        while let Err(back) = producer.try_push(value) {
            value = back;
            waiter.idle();
        }
        waiter.progressed();
    }
}

fn consume(consumer: Consumer<u64>, config: BenchConfig) -> u64 {
    let mut waiter = Waiter::new(config.wait);
    let mut sum = 0u64;
    for _ in 0..config.count {
        let value = loop {
            match consumer.try_pop() {
                Some(value) => break value,
                None => waiter.idle(),
            }
        };
        waiter.progressed();
        sum = sum.wrapping_add(value);
    }
    sum
}

fn run_once(config: BenchConfig) -> Result<(Duration, u64), ConfigError> {
    let (producer, consumer) = handoff::channel::<u64>(config.capacity)?;

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = Arc::clone(&ready);

    let consumer_thread = thread::Builder::new()
        .name("consumer".into())
        .spawn(move || {
            pin_to_cpu(config.consumer_cpu);
            ready_clone.store(true, Ordering::Release);
            consume(consumer, config)
        })
        .expect("spawn consumer thread");

    while !ready.load(Ordering::Acquire) {
        hint::spin_loop();
    }

    let start = Instant::now();

    let producer_thread = thread::Builder::new()
        .name("producer".into())
        .spawn(move || {
            pin_to_cpu(config.producer_cpu);
            produce(producer, config);
        })
        .expect("spawn producer thread");

    producer_thread.join().expect("producer thread panicked");
    let sum = consumer_thread.join().expect("consumer thread panicked");

    Ok((start.elapsed(), sum))
}

/// Formats one run's result line and logs it.
fn report_run(run: u32, elapsed: Duration, sum: u64) -> String {
    #[cfg(feature = "tracing")]
    tracing::info!(
        run,
        elapsed_ms = elapsed.as_millis() as u64,
        sum,
        "run complete"
    );
    format!("run {run}: time: {}ms sum: {sum}", elapsed.as_millis())
}

fn main() -> ExitCode {
    handoff::init_tracing();

    let config = match BenchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ring_bench: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "handoff ring (capacity={}, count={}, runs={}, wait={:?}):",
        config.capacity, config.count, config.runs, config.wait
    );

    let mut total = Duration::ZERO;
    for run in 1..=config.runs {
        let (elapsed, sum) = match run_once(config) {
            Ok(result) => result,
            Err(err) => {
                eprintln!("ring_bench: {err}");
                return ExitCode::FAILURE;
            }
        };

        println!("{}", report_run(run, elapsed, sum));

        if sum != config.expected_sum() {
            eprintln!(
                "ring_bench: checksum mismatch: expected {}, got {sum}",
                config.expected_sum()
            );
            return ExitCode::FAILURE;
        }
        total += elapsed;
    }

    let mean = total / config.runs;
    let ops_per_ms = u128::from(config.count) * 1_000_000 / mean.as_nanos().max(1);
    #[cfg(feature = "tracing")]
    tracing::info!(
        mean_ms = mean.as_millis() as u64,
        ops_per_ms = ops_per_ms as u64,
        "benchmark complete"
    );
    println!("mean: {}ms ({ops_per_ms} ops/ms)", mean.as_millis());

    ExitCode::SUCCESS
}
