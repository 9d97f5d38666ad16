/*!
 # mc-panel

 A Rust library and daemon for provisioning and controlling containerised
 Minecraft servers.

 ## Overview

 mc-panel provides functionality to:
 - Create server entities with a validated configuration and a provisioned data directory
 - Drive each server through a strict lifecycle (`offline`, `starting`, `online`,
   `stopping`, `error`) backed by a container runtime
 - Sample live CPU, memory and player usage of online servers
 - Detect crashed containers and mark their servers as `error`
 - Expose all of the above over an HTTP API with a live event stream

 ## Basic Usage

 ```no_run
 use mc_panel::{Panel, Result};
 use mc_panel::server::CreateServerRequest;

 #[tokio::main]
 async fn main() -> Result<()> {
     let mut panel = Panel::from_config_file("panel.json").await?;
     panel.start().await?;

     let server = panel
         .manager()
         .create(CreateServerRequest {
             name: Some("S1".to_string()),
             version: Some("1.20.4".to_string()),
             memory: Some(1024),
             port: Some(25565),
             max_players: Some(20),
             ..Default::default()
         })
         .await?;

     panel.manager().start(server.id()).await?;

     tokio::signal::ctrl_c().await.ok();
     panel.shutdown().await
 }
 ```

 ## Features

 - **Lifecycle state machine**: per-server locking, bounded asynchronous phases
 - **Port safety**: no two active servers share a host port
 - **Persistence**: entities survive restarts in a JSON state file
 - **Recovery**: servers left mid-transition are resolved on startup
 - **HTTP API**: Actix Web routes, CORS, Server-Sent Events
*/

pub mod api;
pub mod config;
pub mod error;
pub mod runtime;
pub mod server;
pub mod store;

pub use api::{ApiHandle, ApiServer};
pub use config::PanelConfig;
pub use error::{Error, Result};
pub use server::{ServerId, ServerLifecycleManager, ServerSnapshot, ServerStatus};

use config::validate_config;
use runtime::{ContainerRuntime, DockerCliRuntime};
use server::{Provisioner, ServerMonitor, StatsCache, StatsCollector};
use std::path::Path;
use std::sync::Arc;
use store::{JsonFileStore, StateStore};

/// A fully wired panel
///
/// Owns the lifecycle manager and its background services: the stats
/// collector, the crash monitor and, when configured, the HTTP API.
/// All public methods are instrumented with `tracing` spans.
pub struct Panel {
    config: PanelConfig,
    manager: ServerLifecycleManager,
    collector: StatsCollector,
    monitor: ServerMonitor,
    api: Option<ApiHandle>,
}

impl Panel {
    /// Create a panel from a configuration file path
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = PanelConfig::from_file(path)?;
        Self::new(config).await
    }

    /// Create a panel backed by the JSON state file and the docker CLI
    #[tracing::instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub async fn new(config: PanelConfig) -> Result<Self> {
        validate_config(&config)?;

        let store = Arc::new(JsonFileStore::open(config.state_file()).await?);
        let runtime = Arc::new(DockerCliRuntime::new(config.runtime.clone()));

        Ok(Self::with_components(config, store, runtime))
    }

    /// Create a panel over an arbitrary store and container runtime
    pub fn with_components(
        config: PanelConfig,
        store: Arc<dyn StateStore>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        let stats = StatsCache::new();
        let manager = ServerLifecycleManager::new(
            Arc::clone(&store),
            Arc::clone(&runtime),
            Provisioner::new(config.data_dir.clone(), config.runtime.game_port),
            stats.clone(),
            config.lifecycle.clone(),
        );
        let collector = StatsCollector::new(
            store,
            Arc::clone(&runtime),
            stats,
            config.stats.clone(),
        );
        let monitor = ServerMonitor::new(manager.clone(), runtime, config.monitor.clone());

        Self {
            config,
            manager,
            collector,
            monitor,
            api: None,
        }
    }

    /// The lifecycle manager
    pub fn manager(&self) -> &ServerLifecycleManager {
        &self.manager
    }

    /// The panel configuration
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// The running API server, if any
    pub fn api(&self) -> Option<&ApiHandle> {
        self.api.as_ref()
    }

    /// Resolve interrupted transitions, then start the background services
    /// and the HTTP API if configured
    #[tracing::instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        let recovered = self.manager.recover().await?;
        if recovered > 0 {
            tracing::info!(recovered, "Resolved servers left mid-transition");
        }

        self.collector.start().await?;
        self.monitor.start()?;

        if let Some(api_config) = &self.config.api {
            if self.api.is_none() {
                self.api = Some(ApiServer::start(self.manager.clone(), api_config)?);
            }
        }

        tracing::info!("Panel started");
        Ok(())
    }

    /// Stop the HTTP API and the background services.
    ///
    /// Containers are left running; their servers resolve on the next start.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Some(api) = self.api.take() {
            if let Err(e) = api.shutdown().await {
                tracing::warn!(error = %e, "Failed to stop API server");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.monitor.stop() {
            tracing::warn!(error = %e, "Failed to stop server monitor");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.collector.stop().await {
            tracing::warn!(error = %e, "Failed to stop stats collector");
            first_error.get_or_insert(e);
        }

        tracing::info!("Panel shut down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
