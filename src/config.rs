//! Environment-only configuration - no config files, just the variables
//! this process reads at startup.

use anyhow::{Context, Result};
use std::time::Duration;

/// Ten minutes.
pub const FLIGHT_PLAN_TTL: Duration = Duration::from_secs(600);
pub const CONTROLLER_INACTIVE_TIMEOUT: Duration = Duration::from_secs(60);
pub const CONTROLLER_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// At least two distinct snapshot batches must be observed before the
/// controller tracker starts emitting connect/disconnect events.
pub const WARMUP_BATCH_THRESHOLD: u64 = 2;

/// Process-wide settings read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Outbound event bus connection string.
    pub bus_url: String,
    /// TTL store connection string.
    pub ttl_store_url: String,
    /// Log verbosity; `RUST_LOG` takes priority if set.
    pub log_level: String,
    /// Upstream snapshot cadence. Observational only - never consulted by
    /// engine logic.
    pub refresh_interval_ms: Option<u64>,
}

impl Settings {
    /// Load from the process environment. Missing `RABBIT_URL` or
    /// `REDIS_URL` is a fatal initialization error.
    pub fn from_env() -> Result<Self> {
        let bus_url = std::env::var("RABBIT_URL").context("RABBIT_URL must be set")?;
        let ttl_store_url = std::env::var("REDIS_URL").context("REDIS_URL must be set")?;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let refresh_interval_ms = match std::env::var("REFRESH_INTERVAL_MS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!(value = %raw, "REFRESH_INTERVAL_MS is not a valid integer, ignoring");
                    None
                }
            },
            Err(_) => None,
        };

        Ok(Self {
            bus_url,
            ttl_store_url,
            log_level,
            refresh_interval_ms,
        })
    }
}
