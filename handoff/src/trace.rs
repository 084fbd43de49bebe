//! Optional diagnostics for the ring buffer.
//!
//! Build with `--features tracing` to route events through the `tracing`
//! crate. Without the feature every macro below expands to nothing, so the
//! library carries no logging cost at all. The push/pop hot path never logs
//! in either configuration; only construction and teardown do.

/// Installs a `tracing-subscriber` registry that prints to stderr.
///
/// The filter comes from `RUST_LOG` and falls back to `handoff=debug`.
/// Call once at the start of a binary or test. Without the `tracing`
/// feature this does nothing.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("handoff=debug"));

    // A second call (e.g. from two tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use trace_noop as trace;
