//! Logging for the session layer.
//!
//! Backed by `tracing` when the `tracing` feature is on (the default). With
//! the feature off every macro expands to nothing, so the control loop pays
//! no formatting cost.

/// Filter used when neither `RUST_LOG` nor an explicit default is given.
pub const DEFAULT_FILTER: &str = "trakr=info";

/// Install a formatter filtered by `RUST_LOG`, or [`DEFAULT_FILTER`].
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_FILTER);
}

/// Like [`init_tracing`], with `directives` as the fallback filter.
///
/// `RUST_LOG` still wins when set. Invalid directives fall back to
/// [`DEFAULT_FILTER`].
#[cfg(feature = "tracing")]
pub fn init_tracing_with(directives: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Thread names tell the control loop apart from the operator thread.
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(fmt::time::uptime());

    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing_with(_directives: &str) {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop as error;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop as warn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing_with("trakr=debug");
        init_tracing();
        init_tracing_with("not a [valid filter");
        warn!(attempt = 3, "still logging after repeated init");
    }
}
