//! Configuration module for the panel.
//!
//! This module handles parsing, validation, and access to configuration
//! settings. Configurations are loaded from JSON or YAML files, and every
//! section falls back to its defaults when omitted.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use mc_panel::config::PanelConfig;
//!
//! let config = PanelConfig::from_file("panel.json").unwrap();
//! println!("Servers live under {}", config.data_dir.display());
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use mc_panel::config::{ApiConfig, PanelConfig, validate_config};
//!
//! let config = PanelConfig {
//!     data_dir: "/srv/minecraft".into(),
//!     api: Some(ApiConfig::default()),
//!     ..PanelConfig::default()
//! };
//! validate_config(&config).unwrap();
//! ```
mod parser;
pub mod validator;

pub use parser::{
    ApiConfig, DEFAULT_WORKERS, LifecycleConfig, MonitorConfig, PanelConfig, RuntimeConfig,
    StatsConfig,
};
pub use validator::{MAX_MEMORY_MB, validate_config, validate_create_request};
