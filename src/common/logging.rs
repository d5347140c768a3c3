//! Logging and tracing configuration
//!
//! Structured progress output goes through `tracing`; per-case verdicts are
//! printed to stdout separately so they stay readable when logging is off.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the runner (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable. The default
/// level is INFO for this crate, WARN for dependencies; `verbose` raises the
/// crate level to DEBUG, which also traces every matcher step of every
/// entity.
pub fn init(verbose: bool) {
    let default = if verbose {
        "interop=debug,warn"
    } else {
        "interop=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
