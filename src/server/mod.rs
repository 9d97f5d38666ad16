/// Server management module for the panel.
///
/// This module owns the lifecycle of managed game servers: the persisted entity
/// model, the state machine driving containers up and down, live usage
/// sampling, and reconciliation of the recorded status with what the container
/// runtime reports. All public components are instrumented with `tracing` spans.
///
/// # Components
///
/// * `entity` - Server entity, status and request types
/// * `lifecycle` - The state machine and its per-server locking
/// * `events` - Lifecycle event history and live broadcast
/// * `stats` - Transient usage cache and its background collector
/// * `monitor` - Crash detection for online servers
/// * `provision` - Data directory and `server.properties` preparation
///
/// # Examples
///
/// Creating and starting a server:
///
/// ```no_run
/// use mc_panel::config::{LifecycleConfig, RuntimeConfig};
/// use mc_panel::runtime::DockerCliRuntime;
/// use mc_panel::server::{CreateServerRequest, Provisioner, ServerLifecycleManager, StatsCache};
/// use mc_panel::store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn run() -> mc_panel::Result<()> {
/// let manager = ServerLifecycleManager::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(DockerCliRuntime::new(RuntimeConfig::default())),
///     Provisioner::new("/minecraft", 25565),
///     StatsCache::new(),
///     LifecycleConfig::default(),
/// );
///
/// let server = manager
///     .create(CreateServerRequest {
///         name: Some("S1".to_string()),
///         version: Some("1.20.4".to_string()),
///         memory: Some(1024),
///         port: Some(25565),
///         ..Default::default()
///     })
///     .await?;
///
/// manager.start(server.id()).await?;
/// # Ok(())
/// # }
/// ```
///
/// Watching for crashed servers:
///
/// ```no_run
/// use mc_panel::config::MonitorConfig;
/// use mc_panel::runtime::{ContainerRuntime, DockerCliRuntime};
/// use mc_panel::server::{ServerLifecycleManager, ServerMonitor};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn run(manager: ServerLifecycleManager, runtime: Arc<dyn ContainerRuntime>) -> mc_panel::Result<()> {
/// let config = MonitorConfig {
///     check_interval: Duration::from_secs(30),
///     max_consecutive_failures: 2,
/// };
///
/// let mut monitor = ServerMonitor::new(manager, runtime, config);
/// monitor.start()?;
/// # Ok(())
/// # }
/// ```
mod entity;
pub mod events;
pub mod lifecycle;
pub mod monitor;
mod provision;
pub mod stats;

pub use entity::{
    CreateServerRequest, Difficulty, GameMode, RuntimeStats, ServerEntity, ServerId,
    ServerSnapshot, ServerStatus,
};
pub use events::{EventLog, ServerEvent, ServerLifecycleEvent};
pub use lifecycle::ServerLifecycleManager;
pub use monitor::{ServerHealth, ServerMonitor};
pub use provision::Provisioner;
pub use stats::{StatsCache, StatsCollector};
