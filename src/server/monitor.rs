use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::runtime::ContainerRuntime;
use crate::server::lifecycle::ServerLifecycleManager;
use crate::server::{ServerId, ServerStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

/// Server health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHealth {
    /// Container is running
    Healthy,
    /// Container is stopped or missing
    Unhealthy,
    /// Server is not online, or the runtime could not answer
    Unknown,
}

/// Server monitor.
///
/// Reconciles the persisted `Online` status with what the container runtime
/// reports. A server whose container is observed stopped or missing on
/// `maxConsecutiveFailures` consecutive checks is forced to `Error`.
pub struct ServerMonitor {
    reconciler: Arc<Reconciler>,
    /// Monitor task
    monitor_task: Option<JoinHandle<()>>,
    /// Running flag
    running: Arc<Mutex<bool>>,
}

struct Reconciler {
    manager: ServerLifecycleManager,
    runtime: Arc<dyn ContainerRuntime>,
    health_statuses: Mutex<HashMap<ServerId, ServerHealth>>,
    failure_counts: Mutex<HashMap<ServerId, u32>>,
    config: MonitorConfig,
}

impl ServerMonitor {
    /// Create a new server monitor
    pub fn new(
        manager: ServerLifecycleManager,
        runtime: Arc<dyn ContainerRuntime>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            reconciler: Arc::new(Reconciler {
                manager,
                runtime,
                health_statuses: Mutex::new(HashMap::new()),
                failure_counts: Mutex::new(HashMap::new()),
                config,
            }),
            monitor_task: None,
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Start the monitor
    pub fn start(&mut self) -> Result<()> {
        {
            let mut running = self
                .running
                .lock()
                .map_err(|_| Error::Other("Failed to lock running flag".to_string()))?;

            if *running {
                return Ok(());
            }

            *running = true;
        }

        let reconciler = Arc::clone(&self.reconciler);
        let running = Arc::clone(&self.running);
        let check_interval = reconciler.config.check_interval;

        tracing::info!(interval = ?check_interval, "Starting server monitor");

        let task = tokio::spawn(async move {
            let mut interval = time::interval(check_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let keep_running = running.lock().map(|guard| *guard).unwrap_or(false);
                if !keep_running {
                    break;
                }

                match reconciler.reconcile_once().await {
                    Ok(0) => {}
                    Ok(crashed) => tracing::warn!(crashed, "Reconciliation marked servers as crashed"),
                    Err(e) => tracing::warn!(error = %e, "Reconciliation pass failed"),
                }
            }
        });

        self.monitor_task = Some(task);

        Ok(())
    }

    /// Stop the monitor
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut running = self
                .running
                .lock()
                .map_err(|_| Error::Other("Failed to lock running flag".to_string()))?;

            if !*running {
                return Ok(());
            }

            *running = false;
        }

        if let Some(task) = self.monitor_task.take() {
            task.abort();
            tracing::info!("Server monitor stopped");
        }

        Ok(())
    }

    /// Check one server now, forcing it to `Error` when the failure threshold is reached
    pub async fn check_server(&self, id: ServerId) -> Result<ServerHealth> {
        self.reconciler.check_server(id).await
    }

    /// Check every `Online` server once. Returns how many were marked crashed.
    pub async fn reconcile_once(&self) -> Result<usize> {
        self.reconciler.reconcile_once().await
    }

    /// Get server health
    pub fn get_health(&self, id: ServerId) -> Result<ServerHealth> {
        let health_statuses = self
            .reconciler
            .health_statuses
            .lock()
            .map_err(|_| Error::Other("Failed to lock health statuses".to_string()))?;

        health_statuses
            .get(&id)
            .copied()
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))
    }

    /// Get all health statuses
    pub fn get_all_health(&self) -> Result<HashMap<ServerId, ServerHealth>> {
        let health_statuses = self
            .reconciler
            .health_statuses
            .lock()
            .map_err(|_| Error::Other("Failed to lock health statuses".to_string()))?;

        Ok(health_statuses.clone())
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.monitor_task.take() {
            task.abort();
        }
    }
}

impl Reconciler {
    async fn check_server(&self, id: ServerId) -> Result<ServerHealth> {
        self.check(id).await.map(|(health, _)| health)
    }

    /// Returns the observed health and whether the server was marked crashed
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    async fn check(&self, id: ServerId) -> Result<(ServerHealth, bool)> {
        let snapshot = self.manager.get(id).await?;

        let (health, reason) = if snapshot.status() != ServerStatus::Online {
            (ServerHealth::Unknown, None)
        } else {
            match self.runtime.inspect(id).await {
                Ok(state) if state.running => (ServerHealth::Healthy, None),
                Ok(_) => (
                    ServerHealth::Unhealthy,
                    Some("Container is no longer running".to_string()),
                ),
                Err(Error::ContainerNotFound(_)) => (
                    ServerHealth::Unhealthy,
                    Some("Container no longer exists".to_string()),
                ),
                Err(e) => {
                    tracing::debug!(error = %e, "Runtime could not report container state");
                    (ServerHealth::Unknown, None)
                }
            }
        };

        {
            let mut health_statuses = self
                .health_statuses
                .lock()
                .map_err(|_| Error::Other("Failed to lock health statuses".to_string()))?;
            health_statuses.insert(id, health);
        }

        let crashed = {
            let mut failure_counts = self
                .failure_counts
                .lock()
                .map_err(|_| Error::Other("Failed to lock failure counts".to_string()))?;

            match health {
                ServerHealth::Unhealthy => {
                    let count = failure_counts.entry(id).or_insert(0);
                    *count += 1;
                    tracing::debug!(failures = *count, "Server check failed");

                    if *count >= self.config.max_consecutive_failures {
                        failure_counts.remove(&id);
                        true
                    } else {
                        false
                    }
                }
                ServerHealth::Healthy => {
                    failure_counts.remove(&id);
                    false
                }
                // no judgement, keep the count
                ServerHealth::Unknown => false,
            }
        };

        if !crashed {
            return Ok((health, false));
        }

        let reason = reason.unwrap_or_else(|| "Container is no longer running".to_string());
        let marked = self.manager.mark_crashed(id, &reason).await?;
        Ok((health, marked))
    }

    async fn reconcile_once(&self) -> Result<usize> {
        let online: Vec<ServerId> = self
            .manager
            .list()
            .await?
            .into_iter()
            .filter(|s| s.status() == ServerStatus::Online)
            .map(|s| s.id())
            .collect();

        {
            let mut failure_counts = self
                .failure_counts
                .lock()
                .map_err(|_| Error::Other("Failed to lock failure counts".to_string()))?;
            failure_counts.retain(|id, _| online.contains(id));
        }

        let mut crashed = 0;
        for id in online {
            match self.check(id).await {
                Ok((_, true)) => crashed += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!(server_id = %id, error = %e, "Server check failed"),
            }
        }

        Ok(crashed)
    }
}
