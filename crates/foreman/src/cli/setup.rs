//! Process setup for the CLI

use anyhow::Result;

/// Initialize tracing subscriber for logging
///
/// Filter comes from `RUST_LOG` with an `INFO` default. Output goes to
/// stderr so stdout carries only JSON.
///
/// # Errors
/// Returns an error if a subscriber is already installed
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}
