use tracing_subscriber::{fmt, EnvFilter};

/// Installs the stderr subscriber. `RUST_LOG` wins when set; otherwise the
/// level is `warn`, or `debug` for this crate with `--verbose`.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .try_init();
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,cvjoint=debug"
    } else {
        "warn"
    }
}
