//! Logging setup and configuration

use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber for the process
///
/// `RUST_LOG` wins when set; otherwise the configured default level
/// applies to every target.
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Failed to install subscriber: {}", e)))?;

    Ok(())
}
