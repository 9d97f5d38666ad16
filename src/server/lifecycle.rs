use crate::config::LifecycleConfig;
use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, LaunchSpec};
use crate::server::events::{EventLog, ServerEvent, ServerLifecycleEvent};
use crate::server::provision::Provisioner;
use crate::server::stats::StatsCache;
use crate::server::{CreateServerRequest, ServerEntity, ServerId, ServerSnapshot, ServerStatus};
use crate::store::StateStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinError;

/// Server lifecycle manager.
///
/// Owns the state machine of every server entity:
///
/// ```text
/// Offline/Error --start--> Starting --launch ok--> Online --stop--> Stopping --ok--> Offline
///                          Starting --launch err--> Error --> Offline
///                          Stopping --terminate err--> Online
///                          Starting/Stopping --timeout--> Error
///                          Online --crash observed--> Error
/// ```
///
/// `start` and `stop` commit the intermediate status under a per-server lock and
/// return immediately; the container call runs on a spawned task, outside the
/// lock, bounded by the configured timeout. The terminal status is committed
/// only if the server is still in the intermediate status the task started from.
///
/// The manager is cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ServerLifecycleManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn StateStore>,
    runtime: Arc<dyn ContainerRuntime>,
    provisioner: Provisioner,
    stats: StatsCache,
    events: EventLog,
    config: LifecycleConfig,
    /// One lock per server, created on first use
    locks: Mutex<HashMap<ServerId, Arc<AsyncMutex<()>>>>,
    /// Serializes every port-uniqueness decision
    port_gate: AsyncMutex<()>,
}

impl ServerLifecycleManager {
    /// Create a new server lifecycle manager
    pub fn new(
        store: Arc<dyn StateStore>,
        runtime: Arc<dyn ContainerRuntime>,
        provisioner: Provisioner,
        stats: StatsCache,
        config: LifecycleConfig,
    ) -> Self {
        let events = EventLog::new(config.event_history, config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                store,
                runtime,
                provisioner,
                stats,
                events,
                config,
                locks: Mutex::new(HashMap::new()),
                port_gate: AsyncMutex::new(()),
            }),
        }
    }

    /// Validate a request, provision the server directory and persist a new
    /// `Offline` entity.
    ///
    /// # Errors
    ///
    /// * `InvalidConfig` - a required field is missing or malformed
    /// * `PortInUse` - another active server claims the port
    /// * `Provision` - the data directory could not be prepared
    #[tracing::instrument(skip(self, request))]
    pub async fn create(&self, request: CreateServerRequest) -> Result<ServerSnapshot> {
        let entity = ServerEntity::from_request(request)?;
        self.inner.provisioner.provision(&entity).await?;

        let committed = {
            let _gate = self.inner.port_gate.lock().await;
            match self.inner.ensure_port_free(&entity).await {
                Ok(()) => self.inner.store.put(entity.clone()).await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = committed {
            if let Err(cleanup) = self.inner.provisioner.remove(entity.id).await {
                tracing::warn!(server_id = %entity.id, error = %cleanup, "Failed to remove server directory");
            }
            return Err(e);
        }

        tracing::info!(
            server_id = %entity.id,
            name = %entity.name,
            port = entity.port,
            "Server created"
        );
        self.inner.emit(&entity, ServerLifecycleEvent::Created, ServerStatus::Offline, None);

        Ok(ServerSnapshot::new(entity, None))
    }

    /// Begin starting a server.
    ///
    /// Returns once `Starting` is committed; the launch completes in the background.
    ///
    /// # Errors
    ///
    /// * `ServerNotFound` - no such server
    /// * `IllegalTransition` - the server is not `Offline` or `Error`
    /// * `PortInUse` - another active server claims the port
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn start(&self, id: ServerId) -> Result<()> {
        let lock = self.inner.existing_lock(id).await?;
        let entity = {
            let _guard = lock.lock().await;

            let mut entity = self.inner.store.get(id).await?;
            if !matches!(entity.status, ServerStatus::Offline | ServerStatus::Error) {
                return Err(Error::IllegalTransition {
                    id: id.to_string(),
                    from: entity.status,
                    action: "start",
                });
            }

            {
                let _gate = self.inner.port_gate.lock().await;
                self.inner.ensure_port_free(&entity).await?;
                self.inner.store.update_status(id, ServerStatus::Starting).await?;
            }
            entity.status = ServerStatus::Starting;
            entity
        };

        tracing::info!(name = %entity.name, "Server starting");
        self.inner.emit(&entity, ServerLifecycleEvent::Starting, ServerStatus::Starting, None);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.complete_launch(entity).await {
                tracing::error!(server_id = %id, error = %e, "Failed to commit launch result");
            }
        });

        Ok(())
    }

    /// Begin stopping a server.
    ///
    /// Returns once `Stopping` is committed; the terminate completes in the background.
    ///
    /// # Errors
    ///
    /// * `ServerNotFound` - no such server
    /// * `IllegalTransition` - the server is not `Online`
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn stop(&self, id: ServerId) -> Result<()> {
        let lock = self.inner.existing_lock(id).await?;
        let entity = {
            let _guard = lock.lock().await;

            let mut entity = self.inner.store.get(id).await?;
            if entity.status != ServerStatus::Online {
                return Err(Error::IllegalTransition {
                    id: id.to_string(),
                    from: entity.status,
                    action: "stop",
                });
            }

            self.inner.store.update_status(id, ServerStatus::Stopping).await?;
            entity.status = ServerStatus::Stopping;
            entity
        };

        tracing::info!(name = %entity.name, "Server stopping");
        self.inner.emit(&entity, ServerLifecycleEvent::Stopping, ServerStatus::Stopping, None);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.complete_terminate(entity).await {
                tracing::error!(server_id = %id, error = %e, "Failed to commit terminate result");
            }
        });

        Ok(())
    }

    /// Get a server merged with its cached stats
    pub async fn get(&self, id: ServerId) -> Result<ServerSnapshot> {
        let entity = self.inner.store.get(id).await?;
        let stats = self.inner.stats.get(id).await;
        Ok(ServerSnapshot::new(entity, stats))
    }

    /// All servers merged with their cached stats, newest first
    pub async fn list(&self) -> Result<Vec<ServerSnapshot>> {
        let entities = self.inner.store.list().await?;
        let mut snapshots = Vec::with_capacity(entities.len());
        for entity in entities {
            let stats = self.inner.stats.get(entity.id).await;
            snapshots.push(ServerSnapshot::new(entity, stats));
        }
        Ok(snapshots)
    }

    /// Recent lifecycle events of one server, newest first
    pub async fn events(&self, id: ServerId, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        self.inner.store.get(id).await?;
        self.inner.events.server_events(id, limit)
    }

    /// Recent lifecycle events of all servers, newest first
    pub fn all_events(&self, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        self.inner.events.all_events(limit)
    }

    /// Live stream of lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    /// Stats cache shared with the collector
    pub fn stats_cache(&self) -> &StatsCache {
        &self.inner.stats
    }

    /// Force an `Online` server to `Error` after its container was observed dead.
    ///
    /// Returns whether a transition happened.
    #[tracing::instrument(skip(self, reason), fields(server_id = %id))]
    pub async fn mark_crashed(&self, id: ServerId, reason: &str) -> Result<bool> {
        let lock = self.inner.existing_lock(id).await?;
        let _guard = lock.lock().await;

        let entity = self.inner.store.get(id).await?;
        if entity.status != ServerStatus::Online {
            return Ok(false);
        }

        self.inner.store.update_status(id, ServerStatus::Error).await?;
        self.inner
            .store
            .record_error(id, Some(reason.to_string()))
            .await?;
        self.inner.stats.remove(id).await;

        tracing::error!(name = %entity.name, reason, "Server crashed");
        self.inner.emit(
            &entity,
            ServerLifecycleEvent::Crashed,
            ServerStatus::Error,
            Some(reason.to_string()),
        );
        Ok(true)
    }

    /// Resolve servers left in `Starting` or `Stopping` by a previous process.
    ///
    /// A running container resolves to `Online`, anything else to `Offline`.
    /// Returns the number of servers resolved.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize> {
        let pending: Vec<ServerEntity> = self
            .inner
            .store
            .list()
            .await?
            .into_iter()
            .filter(|e| matches!(e.status, ServerStatus::Starting | ServerStatus::Stopping))
            .collect();

        let mut resolved = 0;
        for entity in pending {
            let id = entity.id;
            let (status, error) = match self.inner.runtime.inspect(id).await {
                Ok(snapshot) if snapshot.running => (ServerStatus::Online, None),
                Ok(_) | Err(Error::ContainerNotFound(_)) => (ServerStatus::Offline, None),
                Err(e) => {
                    tracing::warn!(server_id = %id, error = %e, "Inspect failed during recovery");
                    (ServerStatus::Offline, Some(e.to_string()))
                }
            };

            let lock = self.inner.entity_lock(id)?;
            let _guard = lock.lock().await;

            let current = self.inner.store.get(id).await?;
            if current.status != entity.status {
                continue;
            }

            self.inner.store.update_status(id, status).await?;
            if error.is_some() {
                self.inner.store.record_error(id, error.clone()).await?;
            }

            tracing::info!(server_id = %id, from = %entity.status, to = %status, "Server recovered");
            self.inner
                .emit(&entity, ServerLifecycleEvent::Recovered, status, error);
            resolved += 1;
        }

        Ok(resolved)
    }
}

impl Inner {
    fn entity_lock(&self, id: ServerId) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::Other("Failed to lock server lock table".to_string()))?;
        Ok(Arc::clone(locks.entry(id).or_default()))
    }

    /// Lock of a server known to the store; unknown ids never enter the lock table
    async fn existing_lock(&self, id: ServerId) -> Result<Arc<AsyncMutex<()>>> {
        self.store.get(id).await?;
        self.entity_lock(id)
    }

    /// Fails with `PortInUse` if another active server claims the entity's port.
    /// Callers hold the port gate.
    async fn ensure_port_free(&self, entity: &ServerEntity) -> Result<()> {
        let taken = self
            .store
            .list()
            .await?
            .into_iter()
            .any(|other| other.id != entity.id && other.port == entity.port && other.status.is_active());

        if taken {
            return Err(Error::PortInUse(entity.port));
        }
        Ok(())
    }

    fn emit(
        &self,
        entity: &ServerEntity,
        event: ServerLifecycleEvent,
        status: ServerStatus,
        details: Option<String>,
    ) {
        if let Err(e) = self.events.record(entity.id, &entity.name, event, status, details) {
            tracing::warn!(server_id = %entity.id, error = %e, "Failed to record lifecycle event");
        }
    }

    #[tracing::instrument(skip(self, entity), fields(server_id = %entity.id))]
    async fn complete_launch(&self, entity: ServerEntity) -> Result<()> {
        let id = entity.id;
        let spec = LaunchSpec::from_entity(&entity, &self.provisioner.server_dir(id));

        let runtime = Arc::clone(&self.runtime);
        let call = tokio::spawn(async move { runtime.launch(&spec).await });
        let abort = call.abort_handle();
        let outcome = match tokio::time::timeout(self.config.launch_timeout, call).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => Some(Err(Error::LaunchFailed(join_failure("launch", &e)))),
            Err(_) => {
                abort.abort();
                None
            }
        };

        let lock = self.entity_lock(id)?;
        let _guard = lock.lock().await;

        let current = self.store.get(id).await?;
        if current.status != ServerStatus::Starting {
            tracing::warn!(status = %current.status, "Server left Starting during launch, discarding result");
            return Ok(());
        }

        let (status, last_error, event) = match outcome {
            Some(Ok(handle)) => {
                tracing::info!(
                    name = %entity.name,
                    container = %handle.container_name,
                    "Server online"
                );
                (ServerStatus::Online, None, ServerLifecycleEvent::Started)
            }
            Some(Err(e)) => {
                let message = e.to_string();
                tracing::error!(name = %entity.name, error = %e, "Launch failed");
                // a failed launch passes through Error on its way back to Offline
                if let Err(e) = self.write_terminal(id, ServerStatus::Error, Some(Some(message.clone()))).await {
                    tracing::warn!(error = %e, "Failed to record launch failure");
                }
                (ServerStatus::Offline, Some(message), ServerLifecycleEvent::LaunchFailed)
            }
            None => {
                let message = format!("Launch timed out after {:?}", self.config.launch_timeout);
                tracing::error!(name = %entity.name, timeout = ?self.config.launch_timeout, "Launch timed out");
                (ServerStatus::Error, Some(message), ServerLifecycleEvent::TimedOut)
            }
        };

        let status = self.settle(id, status, Some(last_error.clone())).await;
        self.emit(&entity, event, status, last_error);
        Ok(())
    }

    #[tracing::instrument(skip(self, entity), fields(server_id = %entity.id))]
    async fn complete_terminate(&self, entity: ServerEntity) -> Result<()> {
        let id = entity.id;

        let runtime = Arc::clone(&self.runtime);
        let call = tokio::spawn(async move { runtime.terminate(id).await });
        let abort = call.abort_handle();
        let outcome = match tokio::time::timeout(self.config.terminate_timeout, call).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => Some(Err(Error::TerminateFailed(join_failure("terminate", &e)))),
            Err(_) => {
                abort.abort();
                None
            }
        };

        let lock = self.entity_lock(id)?;
        let _guard = lock.lock().await;

        let current = self.store.get(id).await?;
        if current.status != ServerStatus::Stopping {
            tracing::warn!(status = %current.status, "Server left Stopping during terminate, discarding result");
            return Ok(());
        }

        let (status, last_error, event) = match outcome {
            Some(Ok(())) => {
                tracing::info!(name = %entity.name, "Server offline");
                (ServerStatus::Offline, None, ServerLifecycleEvent::Stopped)
            }
            Some(Err(e)) => {
                tracing::warn!(name = %entity.name, error = %e, "Terminate failed, server still online");
                (ServerStatus::Online, Some(e.to_string()), ServerLifecycleEvent::TerminateFailed)
            }
            None => {
                let message = format!(
                    "Terminate timed out after {:?}",
                    self.config.terminate_timeout
                );
                tracing::error!(name = %entity.name, timeout = ?self.config.terminate_timeout, "Terminate timed out");
                (ServerStatus::Error, Some(message), ServerLifecycleEvent::TimedOut)
            }
        };

        // a clean stop leaves the last recorded error in place
        let error_update = last_error.clone().map(Some);
        let status = self.settle(id, status, error_update).await;
        if status != ServerStatus::Online {
            self.stats.remove(id).await;
        }
        self.emit(&entity, event, status, last_error);
        Ok(())
    }

    /// `last_error` of `None` leaves the recorded error untouched
    async fn write_terminal(
        &self,
        id: ServerId,
        status: ServerStatus,
        last_error: Option<Option<String>>,
    ) -> Result<()> {
        self.store.update_status(id, status).await?;
        if let Some(error) = last_error {
            self.store.record_error(id, error).await?;
        }
        Ok(())
    }

    /// Commit a terminal status, retrying once before forcing `Error`.
    ///
    /// Returns the status left in the store. Callers hold the entity lock.
    async fn settle(
        &self,
        id: ServerId,
        status: ServerStatus,
        last_error: Option<Option<String>>,
    ) -> ServerStatus {
        let mut failure = None;
        for attempt in 1..=2 {
            match self.write_terminal(id, status, last_error.clone()).await {
                Ok(()) => return status,
                Err(e) => {
                    tracing::warn!(attempt, status = %status, error = %e, "Failed to commit terminal status");
                    failure = Some(e);
                }
            }
        }

        let reason = match failure {
            Some(e) => format!("Failed to commit {} status: {}", status, e),
            None => format!("Failed to commit {} status", status),
        };
        match self
            .write_terminal(id, ServerStatus::Error, Some(Some(reason)))
            .await
        {
            Ok(()) => ServerStatus::Error,
            Err(e) => {
                tracing::error!(error = %e, "Failed to force server into Error");
                self.store
                    .get(id)
                    .await
                    .map(|entity| entity.status)
                    .unwrap_or(ServerStatus::Error)
            }
        }
    }
}

fn join_failure(action: &str, e: &JoinError) -> String {
    if e.is_panic() {
        format!("Container {} panicked", action)
    } else {
        format!("Container {} was cancelled", action)
    }
}
