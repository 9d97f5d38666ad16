use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of actix-web workers for the HTTP API.
pub const DEFAULT_WORKERS: usize = 4;

/// Settings for the container engine adapter.
///
/// # Examples
///
/// ```
/// use mc_panel::config::RuntimeConfig;
///
/// let runtime = RuntimeConfig::default();
/// assert_eq!(runtime.container_prefix, "minecraft-server");
/// assert_eq!(runtime.image, "itzg/minecraft-server");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Engine command-line binary, resolved through the PATH.
    pub docker_binary: String,

    /// Prefix of every managed container name (`<prefix>-<id>`).
    pub container_prefix: String,

    /// Image every game server runs.
    pub image: String,

    /// Port the game listens on inside the container.
    pub game_port: u16,

    /// Memory added on top of the declared heap when sizing the container limit.
    pub memory_overhead_mb: u32,

    /// Grace period handed to the engine when stopping a container.
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Upper bound for a single engine command.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Upper bound for one liveness/usage snapshot.
    #[serde(with = "humantime_serde")]
    pub inspect_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            container_prefix: "minecraft-server".to_string(),
            image: "itzg/minecraft-server".to_string(),
            game_port: 25565,
            memory_overhead_mb: 512,
            stop_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(180),
            inspect_timeout: Duration::from_secs(10),
        }
    }
}

/// Bounds and buffers of the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LifecycleConfig {
    /// Maximum time a launch may take before the server is forced to `Error`.
    #[serde(with = "humantime_serde")]
    pub launch_timeout: Duration,

    /// Maximum time a terminate may take before the server is forced to `Error`.
    #[serde(with = "humantime_serde")]
    pub terminate_timeout: Duration,

    /// Number of lifecycle events kept in memory.
    pub event_history: usize,

    /// Capacity of the live event broadcast channel.
    pub event_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            launch_timeout: Duration::from_secs(300),
            terminate_timeout: Duration::from_secs(120),
            event_history: 1000,
            event_capacity: 100,
        }
    }
}

/// Stats collector settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsConfig {
    /// Interval between two polls of the online servers.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Reconciliation monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Interval between two reconciliation passes.
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,

    /// Consecutive unhealthy checks before an online server is marked `Error`.
    pub max_consecutive_failures: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            max_consecutive_failures: 2,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Address to bind to.
    pub address: String,
    /// Port to listen on.
    pub port: u16,
    /// Number of actix-web workers, `DEFAULT_WORKERS` when unset.
    pub workers: Option<usize>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 3001,
            workers: None,
        }
    }
}

/// Main configuration for the panel.
///
/// Every section is optional in the file; missing values take their defaults.
///
/// # JSON Schema
///
/// ```json
/// {
///   "dataDir": "/minecraft",
///   "runtime": { "image": "itzg/minecraft-server", "stopTimeout": "30s" },
///   "lifecycle": { "launchTimeout": "2m" },
///   "stats": { "pollInterval": "5s" },
///   "monitor": { "checkInterval": "30s", "maxConsecutiveFailures": 2 },
///   "api": { "address": "0.0.0.0", "port": 3001 }
/// }
/// ```
///
/// # Examples
///
/// ```
/// use mc_panel::config::PanelConfig;
///
/// let config = PanelConfig::parse_from_str(r#"{ "dataDir": "/srv/mc" }"#).unwrap();
/// assert_eq!(config.state_file().to_str(), Some("/srv/mc/servers.json"));
/// assert!(config.api.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelConfig {
    /// Root directory holding one sub-directory per server.
    pub data_dir: PathBuf,

    /// Location of the durable state document, `<dataDir>/servers.json` when unset.
    pub state_file: Option<PathBuf>,

    /// Container engine settings.
    pub runtime: RuntimeConfig,

    /// Lifecycle manager settings.
    pub lifecycle: LifecycleConfig,

    /// Stats collector settings.
    pub stats: StatsConfig,

    /// Reconciliation monitor settings.
    pub monitor: MonitorConfig,

    /// HTTP API settings; the API is not served when absent.
    pub api: Option<ApiConfig>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/minecraft"),
            state_file: None,
            runtime: RuntimeConfig::default(),
            lifecycle: LifecycleConfig::default(),
            stats: StatsConfig::default(),
            monitor: MonitorConfig::default(),
            api: None,
        }
    }
}

impl PanelConfig {
    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The contents are not valid JSON/YAML
    /// * The document does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_from_yaml_str(&content),
            _ => Self::parse_from_str(&content),
        }
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// Resolved location of the durable state document.
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("servers.json"))
    }
}
