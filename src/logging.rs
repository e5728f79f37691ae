//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default filter directive for the given verbosity.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Initialize the global tracing subscriber on stderr.
///
/// `RUST_LOG` wins over `verbose` when set. With `json` each event is one
/// JSON object per line. Subsequent calls are no-ops.
pub fn init_subscriber(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // set_global_default is a no-op if already set
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}
