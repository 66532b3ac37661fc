//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "accel_events=info";

/// Install a default fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`]. Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_FILTER);
}

/// Same as [`init_tracing`] with an explicit fallback filter. Returns
/// whether this call installed the subscriber.
pub fn init_tracing_with(fallback: &str) -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
