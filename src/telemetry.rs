use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::settings::{LogFormat, LogSettings};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(settings: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    let registry = tracing_subscriber::registry().with(filter);

    match settings.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer()).try_init()?,
    }

    Ok(())
}
