use tracing_subscriber::EnvFilter;

/// Default filter directive for this crate's log output.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "rhdh_perf=debug,info"
    } else {
        "rhdh_perf=info,warn"
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `verbose`.
/// Calling it twice is harmless; the second install is ignored.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
