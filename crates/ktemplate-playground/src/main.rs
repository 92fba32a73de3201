//! Playground server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`PLAYGROUND_CONFIG` or `playground.yaml`, then
//!    environment overrides)
//! 2. Initialize structured logging (tracing)
//! 3. Render the UI page and build shared state
//! 4. Serve until `Ctrl-C` / `SIGTERM`

use std::sync::Arc;

use anyhow::Context;
use ktemplate_playground::config::{LogFormat, LoggingConfig, PlaygroundConfig};
use ktemplate_playground::{start_server, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PlaygroundConfig::load().context("loading configuration")?;
    init_logging(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        engine = ktemplate::engine_version(),
        static_dir = %config.server.static_dir.display(),
        "ktemplate-playground starting"
    );

    let state = AppState::new(&config.server).context("building application state")?;
    start_server(&config.server, Arc::new(state))
        .await
        .context("running playground server")?;
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
