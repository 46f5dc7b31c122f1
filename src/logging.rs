//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so the end-of-run report on stdout stays clean.
//! `RUST_LOG` wins when set; otherwise the level is `info`, or `debug`
//! with `--verbose`.

use tracing_subscriber::EnvFilter;

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "chart_tiles=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
