//! Logging setup for the stagewise binary

use crate::settings::LogFormat;
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset
///
/// `stagewise` is this binary's crate name, so it is the target prefix of
/// every event logged from the binary.
const DEFAULT_FILTER: &str = "stagewise=info,stagewise_core=info";

/// Install the global tracing subscriber
///
/// Logs go to stderr so the JSON-lines sink can own stdout.
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: `stagewise=info,stagewise_core=info`)
pub fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| anyhow!("Failed to create env filter: {}", e))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SharedBuffer;

    #[test]
    fn test_default_filter_keeps_binary_info_logs() {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::try_new(DEFAULT_FILTER).unwrap())
            .with(fmt::layer().with_writer(move || writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Stage summary");
            tracing::debug!("Per-item detail");
            tracing::info!(target: "stagewise_core::application", "Worker started");
            tracing::info!(target: "other_crate", "Unrelated noise");
        });

        let logged = buffer.contents();
        assert!(logged.contains("Stage summary"));
        assert!(logged.contains("Worker started"));
        assert!(!logged.contains("Per-item detail"));
        assert!(!logged.contains("Unrelated noise"));
    }
}
