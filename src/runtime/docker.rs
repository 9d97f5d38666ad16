// src/runtime/docker.rs
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, ContainerSnapshot, LaunchSpec, RuntimeHandle};
use crate::server::ServerId;
use async_process::{Command, Stdio};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Captured result of one engine command
#[derive(Debug)]
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// `.State` section of `docker inspect`
#[derive(Debug, Deserialize)]
struct ContainerState {
    #[serde(rename = "Running")]
    running: bool,
    #[serde(rename = "Status", default)]
    status: String,
}

/// One line of `docker stats --format {{json .}}`
#[derive(Debug, Deserialize)]
struct StatsLine {
    #[serde(rename = "CPUPerc")]
    cpu_perc: String,
    #[serde(rename = "MemPerc")]
    mem_perc: String,
}

/// Container runtime driving the `docker` command-line client.
///
/// Every call builds an argument vector; nothing goes through a shell.
#[derive(Debug, Clone)]
pub struct DockerCliRuntime {
    config: RuntimeConfig,
}

impl DockerCliRuntime {
    /// Create a runtime from configuration
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Derived container name for a server
    pub fn container_name(&self, id: ServerId) -> String {
        id.container_name(&self.config.container_prefix)
    }

    /// Arguments of the `docker run` invocation for a launch
    fn run_args(&self, spec: &LaunchSpec, name: &str) -> Result<Vec<String>> {
        let memory_limit = spec
            .memory_mb
            .checked_add(self.config.memory_overhead_mb)
            .ok_or_else(|| {
                Error::LaunchFailed(format!(
                    "Memory limit {}MB plus overhead {}MB overflows",
                    spec.memory_mb, self.config.memory_overhead_mb
                ))
            })?;

        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.to_string(),
            "-v".to_string(),
            format!("{}:/data", spec.data_dir.display()),
            "-p".to_string(),
            format!("{}:{}", spec.host_port, self.config.game_port),
            "--memory".to_string(),
            format!("{}m", memory_limit),
        ];

        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(self.config.image.clone());
        Ok(args)
    }

    /// Run one engine command, bounded by the command timeout
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        self.run_with_timeout(args, self.config.command_timeout).await
    }

    async fn run_with_timeout(&self, args: &[String], limit: Duration) -> Result<CommandOutput> {
        tracing::trace!(binary = %self.config.docker_binary, ?args, "Running engine command");

        let mut command = Command::new(&self.config.docker_binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "'{} {}' did not finish within {:?}",
                    self.config.docker_binary,
                    args.first().map(String::as_str).unwrap_or_default(),
                    limit
                ))
            })?
            .map_err(|e| {
                Error::RuntimeUnavailable(format!(
                    "Failed to execute '{}': {}",
                    self.config.docker_binary, e
                ))
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Remove a leftover container with the derived name
    async fn remove_stale(&self, name: &str) -> Result<()> {
        let args = vec!["rm".to_string(), "-f".to_string(), name.to_string()];
        let output = self.run(&args).await?;
        if output.success {
            return Ok(());
        }

        match classify_failure(&output.stderr, Error::ConflictingName) {
            Error::ContainerNotFound(_) => Ok(()),
            e => Err(e),
        }
    }

    async fn inspect_state(&self, name: &str) -> Result<ContainerState> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .State}}".to_string(),
            name.to_string(),
        ];
        let output = self.run(&args).await?;
        if !output.success {
            return Err(classify_failure(&output.stderr, Error::RuntimeUnavailable));
        }

        serde_json::from_str(&output.stdout).map_err(|e| {
            Error::Serialization(format!("Unexpected inspect output for {}: {}", name, e))
        })
    }

    async fn usage(&self, name: &str) -> Result<(f64, f64)> {
        let args = vec![
            "stats".to_string(),
            "--no-stream".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
            name.to_string(),
        ];
        let output = self.run(&args).await?;
        if !output.success {
            return Err(classify_failure(&output.stderr, Error::Unavailable));
        }

        let line = output.stdout.lines().last().unwrap_or_default();
        let stats: StatsLine = serde_json::from_str(line).map_err(|e| {
            Error::Serialization(format!("Unexpected stats output for {}: {}", name, e))
        })?;

        Ok((parse_percent(&stats.cpu_perc), parse_percent(&stats.mem_perc)))
    }

    async fn snapshot(&self, name: &str) -> Result<ContainerSnapshot> {
        let state = self.inspect_state(name).await?;
        if !state.running {
            tracing::debug!(container = %name, status = %state.status, "Container is not running");
            return Ok(ContainerSnapshot::default());
        }

        let (cpu_percent, memory_percent) = self.usage(name).await?;
        Ok(ContainerSnapshot {
            running: true,
            cpu_percent,
            memory_percent,
            players_online: None,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    #[tracing::instrument(skip(self, spec), fields(server_id = %spec.id))]
    async fn launch(&self, spec: &LaunchSpec) -> Result<RuntimeHandle> {
        let name = self.container_name(spec.id);

        self.remove_stale(&name).await?;

        let output = self.run(&self.run_args(spec, &name)?).await?;
        if !output.success {
            let error = classify_failure(&output.stderr, Error::LaunchFailed);
            tracing::error!(container = %name, error = %error, "Container failed to launch");

            // `run` may have created the container before failing to start it
            if !matches!(error, Error::RuntimeUnavailable(_)) {
                if let Err(e) = self.remove_stale(&name).await {
                    tracing::warn!(container = %name, error = %e, "Failed to remove partial container");
                }
            }
            return Err(error);
        }

        let container_id = output.stdout.lines().last().unwrap_or_default().to_string();
        tracing::info!(container = %name, container_id = %container_id, "Container launched");

        Ok(RuntimeHandle {
            container_name: name,
            container_id,
        })
    }

    #[tracing::instrument(skip(self), fields(server_id = %id))]
    async fn terminate(&self, id: ServerId) -> Result<()> {
        let name = self.container_name(id);

        let stop_args = vec![
            "stop".to_string(),
            "-t".to_string(),
            self.config.stop_timeout.as_secs().to_string(),
            name.clone(),
        ];
        // the engine waits for the grace period before answering
        let stop_limit = self.config.command_timeout + self.config.stop_timeout;
        let output = self.run_with_timeout(&stop_args, stop_limit).await?;
        if !output.success {
            match classify_failure(&output.stderr, Error::TerminateFailed) {
                Error::ContainerNotFound(_) => {
                    tracing::debug!(container = %name, "Container already gone");
                    return Ok(());
                }
                e => return Err(e),
            }
        }

        let rm_args = vec!["rm".to_string(), name.clone()];
        let output = self.run(&rm_args).await?;
        if !output.success {
            match classify_failure(&output.stderr, Error::TerminateFailed) {
                Error::ContainerNotFound(_) => {}
                e => return Err(e),
            }
        }

        tracing::info!(container = %name, "Container terminated");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(server_id = %id))]
    async fn inspect(&self, id: ServerId) -> Result<ContainerSnapshot> {
        let name = self.container_name(id);
        let limit = self.config.inspect_timeout;

        tokio::time::timeout(limit, self.snapshot(&name))
            .await
            .map_err(|_| Error::Timeout(format!("Inspecting {} exceeded {:?}", name, limit)))?
    }
}

/// Map engine stderr onto the error taxonomy, `fallback` when nothing matches
fn classify_failure(stderr: &str, fallback: fn(String) -> Error) -> Error {
    let lower = stderr.to_lowercase();
    let message = stderr.to_string();

    if lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("error during connect")
        || lower.contains("permission denied while trying to connect")
    {
        Error::RuntimeUnavailable(message)
    } else if lower.contains("no such container") || lower.contains("no such object") {
        Error::ContainerNotFound(message)
    } else if lower.contains("is already in use by container") || lower.contains("conflict") {
        Error::ConflictingName(message)
    } else if lower.contains("port is already allocated")
        || lower.contains("address already in use")
        || lower.contains("cannot allocate memory")
        || lower.contains("out of memory")
        || lower.contains("no space left on device")
    {
        Error::ResourceExhausted(message)
    } else {
        fallback(message)
    }
}

/// Parse `"12.34%"`; unknown readings (`"--"`) count as zero
fn parse_percent(value: &str) -> f64 {
    value.trim().trim_end_matches('%').parse().unwrap_or(0.0)
}
