//! Tracing setup for the list provider.
//!
//! Structured logs are the provider's only operator-facing error channel:
//! per-shield failures surface here and as lag in the published event
//! stream, never as a user-facing error.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Respects `RUST_LOG`; defaults
/// to `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
