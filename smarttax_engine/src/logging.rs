use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging to stderr.
///
/// The filter comes from `RUST_LOG` when set, otherwise `level` is applied
/// to this crate and `warn` to everything else.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let default_filter = format!("warn,smarttax_engine={level}");
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&default_filter))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()?;

    tracing::debug!(filter = %default_filter, "logging initialized");
    Ok(())
}
