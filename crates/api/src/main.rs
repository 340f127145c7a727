//! Swing Stats - Main Entry Point

use anyhow::Context;
use api::{init_logging, install_metrics, run_server, AppConfig, AppState};
use storage::Repository;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;

    init_logging(&config.logging)?;

    info!("=== Swing Stats v{} ===", env!("CARGO_PKG_VERSION"));

    let repository = Repository::connect(&config.database_url)
        .await
        .with_context(|| format!("opening repository {}", config.database_url))?;

    let metrics_enabled = config.metrics_enabled;
    let mut state = AppState::new(config, repository)?;
    if metrics_enabled {
        state = state.with_metrics(install_metrics()?);
    }

    run_server(state).await?;

    Ok(())
}
