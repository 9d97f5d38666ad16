//! Process runtime adapter.
//!
//! This module defines the boundary between the lifecycle manager and the
//! container engine. The [`ContainerRuntime`] trait is the seam: the panel
//! ships [`DockerCliRuntime`], and tests substitute their own implementations.
//!
//! Adapters never retry. Failures are reported in the crate's error taxonomy
//! (`RuntimeUnavailable`, `ConflictingName`, `ResourceExhausted`,
//! `ContainerNotFound`, `LaunchFailed`, `TerminateFailed`, `Timeout`) and the
//! caller decides what to do with them.
//!
//! # Examples
//!
//! ```no_run
//! use mc_panel::config::RuntimeConfig;
//! use mc_panel::runtime::{ContainerRuntime, DockerCliRuntime};
//! use mc_panel::server::ServerId;
//!
//! # async fn run() -> mc_panel::Result<()> {
//! let runtime = DockerCliRuntime::new(RuntimeConfig::default());
//! let snapshot = runtime.inspect(ServerId::new()).await?;
//! println!("running: {}", snapshot.running);
//! # Ok(())
//! # }
//! ```
mod docker;

pub use docker::DockerCliRuntime;

use crate::error::Result;
use crate::server::{ServerEntity, ServerId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Typed parameters of a container launch, derived from an entity
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    /// Server the container belongs to
    pub id: ServerId,
    /// Declared heap size in MB
    pub memory_mb: u32,
    /// Host port mapped to the game port
    pub host_port: u16,
    /// Host directory mounted as the server's data volume
    pub data_dir: PathBuf,
    /// Environment handed to the container
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// Derive launch parameters from an entity's declared configuration
    pub fn from_entity(entity: &ServerEntity, data_dir: &Path) -> Self {
        let env = vec![
            ("EULA".to_string(), "TRUE".to_string()),
            ("TYPE".to_string(), "VANILLA".to_string()),
            ("VERSION".to_string(), entity.version.clone()),
            ("MEMORY".to_string(), format!("{}M", entity.memory_limit_mb)),
            ("SERVER_NAME".to_string(), entity.name.clone()),
            ("MAX_PLAYERS".to_string(), entity.max_players.to_string()),
            ("MODE".to_string(), entity.gamemode.as_str().to_string()),
            ("DIFFICULTY".to_string(), entity.difficulty.as_str().to_string()),
            (
                "ENABLE_COMMAND_BLOCK".to_string(),
                entity.command_blocks_enabled.to_string(),
            ),
        ];

        Self {
            id: entity.id,
            memory_mb: entity.memory_limit_mb,
            host_port: entity.port,
            data_dir: data_dir.to_path_buf(),
            env,
        }
    }
}

/// Handle to a launched container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeHandle {
    /// Derived container name
    pub container_name: String,
    /// Engine-assigned container id
    pub container_id: String,
}

/// Point-in-time liveness and usage of a container
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContainerSnapshot {
    pub running: bool,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// Player count, when the adapter can observe it
    pub players_online: Option<u32>,
}

/// Container engine operations used by the lifecycle manager
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start the container for `spec.id`, replacing any stale leftover
    async fn launch(&self, spec: &LaunchSpec) -> Result<RuntimeHandle>;

    /// Stop and remove the container for `id`; an absent container is success
    async fn terminate(&self, id: ServerId) -> Result<()>;

    /// Inspect the container for `id`
    async fn inspect(&self, id: ServerId) -> Result<ContainerSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::CreateServerRequest;

    #[test]
    fn test_launch_spec_from_entity() {
        let entity = ServerEntity::from_request(CreateServerRequest {
            name: Some("S1".to_string()),
            version: Some("1.20.4".to_string()),
            memory: Some(1024),
            port: Some(25570),
            enable_command_blocks: Some(true),
            ..Default::default()
        })
        .unwrap();

        let spec = LaunchSpec::from_entity(&entity, Path::new("/minecraft/x"));

        assert_eq!(spec.host_port, 25570);
        assert_eq!(spec.memory_mb, 1024);
        assert_eq!(spec.data_dir, PathBuf::from("/minecraft/x"));
        assert!(spec.env.contains(&("MEMORY".to_string(), "1024M".to_string())));
        assert!(spec.env.contains(&("VERSION".to_string(), "1.20.4".to_string())));
        assert!(spec.env.contains(&("ENABLE_COMMAND_BLOCK".to_string(), "true".to_string())));
        assert!(spec.env.contains(&("EULA".to_string(), "TRUE".to_string())));
    }
}
