//! Diagnostic tracing for the controller, written to stderr.
//!
//! Diagnostics are separate from run output: step narration, `--json` lines
//! and the final state go to stdout, and `--trace-out` records go to disk.
//! None of those depend on `RUST_LOG`.
//!
//! ```bash
//! RUST_LOG=reviewloop=debug reviewloop run --task "plan a blog"
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directive used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber: `RUST_LOG` filter, compact stderr output.
///
/// Calling it twice keeps the first subscriber.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
