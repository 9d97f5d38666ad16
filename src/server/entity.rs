// src/server/entity.rs
use crate::config::validate_create_request;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a managed server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(Uuid);

impl ServerId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Name of the container backing this server
    pub fn container_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.0)
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| Error::ServerNotFound(s.to_string()))
    }
}

/// Lifecycle status of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// No container is running
    Offline,
    /// A launch is in flight
    Starting,
    /// The container is up
    Online,
    /// A terminate is in flight
    Stopping,
    /// Needs operator attention
    Error,
}

impl ServerStatus {
    /// Whether the server claims its port
    pub fn is_active(&self) -> bool {
        !matches!(self, ServerStatus::Offline)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Offline => "offline",
            ServerStatus::Starting => "starting",
            ServerStatus::Online => "online",
            ServerStatus::Stopping => "stopping",
            ServerStatus::Error => "error",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game mode written to `server.properties`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Survival => "survival",
            GameMode::Creative => "creative",
            GameMode::Adventure => "adventure",
            GameMode::Spectator => "spectator",
        }
    }
}

/// Difficulty written to `server.properties`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Peaceful,
    #[default]
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Peaceful => "peaceful",
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

/// Input of a create operation.
///
/// Every field is optional on the wire so that missing values surface as
/// `InvalidConfig` rather than as a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerRequest {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Memory limit in MB
    pub memory: Option<u32>,
    pub port: Option<u16>,
    pub max_players: Option<u32>,
    pub gamemode: Option<GameMode>,
    pub difficulty: Option<Difficulty>,
    pub enable_command_blocks: Option<bool>,
}

/// Persisted record of a managed server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntity {
    pub id: ServerId,
    pub name: String,
    pub version: String,
    #[serde(rename = "memoryLimitMB")]
    pub memory_limit_mb: u32,
    pub port: u16,
    pub max_players: u32,
    pub gamemode: GameMode,
    pub difficulty: Difficulty,
    pub command_blocks_enabled: bool,
    pub status: ServerStatus,
    pub created_at: DateTime<Utc>,
    /// Most recent asynchronous failure recorded against the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ServerEntity {
    /// Build a new `Offline` entity from a validated request
    pub fn from_request(request: CreateServerRequest) -> Result<Self> {
        validate_create_request(&request)?;

        // validate_create_request guarantees these are present
        let missing = |field: &str| Error::InvalidConfig(format!("Missing required field: {}", field));

        Ok(Self {
            id: ServerId::new(),
            name: request.name.ok_or_else(|| missing("name"))?.trim().to_string(),
            version: request.version.ok_or_else(|| missing("version"))?,
            memory_limit_mb: request.memory.ok_or_else(|| missing("memory"))?,
            port: request.port.ok_or_else(|| missing("port"))?,
            max_players: request.max_players.unwrap_or(20),
            gamemode: request.gamemode.unwrap_or_default(),
            difficulty: request.difficulty.unwrap_or_default(),
            command_blocks_enabled: request.enable_command_blocks.unwrap_or(false),
            status: ServerStatus::Offline,
            created_at: Utc::now(),
            last_error: None,
        })
    }
}

/// Live usage of an online server. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub players_online: u32,
}

/// A server entity merged with its live stats, as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    #[serde(flatten)]
    pub entity: ServerEntity,
    pub runtime_stats: RuntimeStats,
}

impl ServerSnapshot {
    /// Merge stats into an entity; stats are only kept while `Online`
    pub fn new(entity: ServerEntity, stats: Option<RuntimeStats>) -> Self {
        let runtime_stats = match entity.status {
            ServerStatus::Online => stats.unwrap_or_default(),
            _ => RuntimeStats::default(),
        };
        Self {
            entity,
            runtime_stats,
        }
    }

    pub fn id(&self) -> ServerId {
        self.entity.id
    }

    pub fn status(&self) -> ServerStatus {
        self.entity.status
    }
}
