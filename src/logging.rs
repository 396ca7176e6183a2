//! Log output for the `oembed` binary
//!
//! Logs go to stderr so `resolve` and `batch` output stays clean JSON.
//! `RUST_LOG` takes precedence over the `-v` count:
//!
//! - `RUST_LOG=oembed_resolver=debug` - dispatch and derivative cache decisions
//! - `RUST_LOG=warn` - classified resolution failures only

use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
