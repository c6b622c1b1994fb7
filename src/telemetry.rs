//! Logging setup
//!
//! fleetstage logs through `tracing`; test binaries decide where the events
//! go. Plain fmt output to stderr, filtered by `RUST_LOG`.
//!
//! # Example
//!
//! ```no_run
//! fleetstage::telemetry::init_logging();
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install a global subscriber filtered by `RUST_LOG` (default: info)
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_logging() {
    init_logging_with(DEFAULT_DIRECTIVE);
}

/// Like [`init_logging`], with a different fallback filter
///
/// ```no_run
/// fleetstage::telemetry::init_logging_with("fleetstage=debug,kube=warn");
/// ```
pub fn init_logging_with(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging_with("fleetstage=trace");
    }
}
