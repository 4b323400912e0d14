use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Ensure initialization happens only once
static INIT: Once = Once::new();

/// Initialize the logging system with sensible defaults.
///
/// Log level can be set using the RUST_LOG environment variable.
/// Example: RUST_LOG=debug,url_shortener=trace
pub fn init() {
    init_with_default("info");
}

/// Same as [`init`], but falls back to `directive` instead of `info`
/// when RUST_LOG is not set.
pub fn init_with_default(directive: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true) // Include module path in logs
                    .with_thread_ids(true) // Useful for debugging concurrency issues
                    .with_line_number(true),
            )
            .init();

        tracing::info!("Logging initialized");
    });
}

/// Macro for logging admission decisions
#[macro_export]
macro_rules! admission_event {
    ($client:expr, $allowed:expr, $remaining:expr, $limit:expr) => {
        tracing::debug!(
            client_id = $client,
            allowed = $allowed,
            remaining = $remaining,
            limit = $limit,
            "Admission check"
        )
    };
}

/// Macro for logging registry mutations
#[macro_export]
macro_rules! link_event {
    ($operation:expr, $code:expr) => {
        tracing::debug!(operation = $operation, code = $code, "Link registry operation")
    };
}
