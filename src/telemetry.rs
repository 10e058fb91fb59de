//! Tracing subscriber init, using the target-first console formatter
//! (`log_format::TargetFirstFormat`).

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Priority: `RUST_LOG` if set, otherwise `default_level` (typically the
/// process's `LOG_LEVEL` setting).
pub fn init(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(crate::log_format::TargetFirstFormat)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}
