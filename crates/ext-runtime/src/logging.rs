use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a compact tracing subscriber for hosts that have none.
///
/// Output goes to stderr. The level comes from `RUST_LOG`, defaulting to
/// `default_level` when the variable is unset or invalid. Fails if a global
/// subscriber is already installed.
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact();

    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
