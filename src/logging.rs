//! Tracing subscriber setup for the binary.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("Failed to install tracing subscriber: {}", err))
}
