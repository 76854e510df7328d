//! Structured logging setup.
//!
//! Diagnostics go through `tracing`; output is quiet by default so the
//! dashboard stays clean, and `RUST_LOG` opens it up for debugging scans.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize console logging. Honors `RUST_LOG`, defaulting to warnings.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
