//! Process-wide tracing setup for the binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Picks the filter directive: `RUST_LOG` wins, otherwise `debug` for this
/// crate when verbose and `warn` everywhere if not.
pub fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,notepool=debug")
        } else {
            EnvFilter::new("warn")
        }
    })
}

/// Installs a stderr formatter. Calling it twice is harmless; the second call
/// leaves the first subscriber in place.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
