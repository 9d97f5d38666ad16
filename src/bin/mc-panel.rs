use anyhow::Context;
use mc_panel::{Panel, PanelConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const CONFIG_ENV: &str = "MC_PANEL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "panel.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let config_path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = if config_path.exists() {
        info!(path = %config_path.display(), "Loading panel configuration");
        PanelConfig::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
        PanelConfig::default()
    };

    // the daemon always serves the API
    if config.api.is_none() {
        config.api = Some(Default::default());
    }

    let mut panel = Panel::new(config).await.context("initialising panel")?;
    panel.start().await.context("starting panel")?;

    if let Some(api) = panel.api() {
        for addr in api.addrs() {
            info!(" - Servers:       GET/POST http://{}/api/servers", addr);
            info!(" - Event stream:  GET      http://{}/api/events", addr);
        }
    }
    info!("Press Ctrl+C to exit");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;

    info!("Shutting down");
    panel.shutdown().await.context("shutting down panel")?;

    Ok(())
}
