//! Log output for the command-line front end.
//!
//! Logs go to stderr so that answers printed on stdout stay pipeable.
//! `RUST_LOG` takes precedence over the `--verbose` flag:
//!
//! ```bash
//! RUST_LOG=docqa_rag=debug docqa query "What is MMR?"
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install the global `fmt` subscriber.
///
/// Only the first call takes effect.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();
}
