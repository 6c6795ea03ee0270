use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install the fmt subscriber, writing to stderr so stdout stays clean for results
///
/// `RUST_LOG` wins when set. Otherwise the workspace crates log at `info`
/// (`debug` in debug builds or with `verbose`).
pub fn setup_logging(verbose: bool) {
    let level = if verbose || cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,guide_map={level},guide_map_lib={level}")));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::debug!("Logging initialized");
}
