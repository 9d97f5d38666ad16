use crate::config::PanelConfig;
use crate::error::{Error, Result};
use crate::server::CreateServerRequest;
use std::time::Duration;

/// Largest memory limit a server may request, in MB
pub const MAX_MEMORY_MB: u32 = 256 * 1024;

/// Validates a server creation request.
///
/// Name, version, memory and port are required. Blank strings and zero values
/// count as missing.
pub fn validate_create_request(request: &CreateServerRequest) -> Result<()> {
    let mut missing = Vec::new();

    if request.name.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        missing.push("name");
    }
    if request.version.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        missing.push("version");
    }
    if request.memory.unwrap_or(0) == 0 {
        missing.push("memory");
    }
    if request.port.unwrap_or(0) == 0 {
        missing.push("port");
    }

    if !missing.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    if let Some(memory) = request.memory {
        if memory > MAX_MEMORY_MB {
            return Err(Error::InvalidConfig(format!(
                "memory must be at most {}MB, got {}MB",
                MAX_MEMORY_MB, memory
            )));
        }
    }

    if request.max_players == Some(0) {
        return Err(Error::InvalidConfig(
            "maxPlayers must be at least 1".to_string(),
        ));
    }

    // the version ends up in a container environment variable
    if let Some(version) = &request.version {
        if version.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidConfig(format!(
                "Version '{}' contains whitespace",
                version
            )));
        }
    }

    Ok(())
}

fn require_non_zero(name: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(Error::InvalidConfig(format!("{} must be greater than zero", name)));
    }
    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &PanelConfig) -> Result<()> {
    let runtime = &config.runtime;
    if runtime.docker_binary.is_empty() {
        return Err(Error::InvalidConfig("runtime.dockerBinary is empty".to_string()));
    }
    if runtime.container_prefix.is_empty() {
        return Err(Error::InvalidConfig("runtime.containerPrefix is empty".to_string()));
    }
    if runtime.image.is_empty() {
        return Err(Error::InvalidConfig("runtime.image is empty".to_string()));
    }
    if runtime.game_port == 0 {
        return Err(Error::InvalidConfig("runtime.gamePort must not be 0".to_string()));
    }
    require_non_zero("runtime.commandTimeout", runtime.command_timeout)?;
    require_non_zero("runtime.inspectTimeout", runtime.inspect_timeout)?;

    require_non_zero("lifecycle.launchTimeout", config.lifecycle.launch_timeout)?;
    require_non_zero("lifecycle.terminateTimeout", config.lifecycle.terminate_timeout)?;
    if config.lifecycle.event_capacity == 0 {
        return Err(Error::InvalidConfig(
            "lifecycle.eventCapacity must be greater than zero".to_string(),
        ));
    }

    require_non_zero("stats.pollInterval", config.stats.poll_interval)?;
    require_non_zero("monitor.checkInterval", config.monitor.check_interval)?;
    if config.monitor.max_consecutive_failures == 0 {
        return Err(Error::InvalidConfig(
            "monitor.maxConsecutiveFailures must be at least 1".to_string(),
        ));
    }

    Ok(())
}
