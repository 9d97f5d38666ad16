use crate::config::StatsConfig;
use crate::error::{Error, Result};
use crate::runtime::ContainerRuntime;
use crate::server::{RuntimeStats, ServerId, ServerStatus};
use crate::store::StateStore;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time;

/// Transient live usage keyed by server id. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct StatsCache {
    inner: Arc<RwLock<HashMap<ServerId, RuntimeStats>>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: ServerId) -> Option<RuntimeStats> {
        self.inner.read().await.get(&id).copied()
    }

    pub async fn insert(&self, id: ServerId, stats: RuntimeStats) {
        self.inner.write().await.insert(id, stats);
    }

    pub async fn remove(&self, id: ServerId) -> Option<RuntimeStats> {
        self.inner.write().await.remove(&id)
    }

    /// Drop every entry whose id is not in `keep`
    pub async fn retain(&self, keep: &[ServerId]) {
        self.inner.write().await.retain(|id, _| keep.contains(id));
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Periodically samples live usage of every online server.
///
/// The collector only ever writes [`StatsCache`]; it never changes a server's
/// status. Crash detection belongs to [`ServerMonitor`](crate::server::ServerMonitor).
pub struct StatsCollector {
    store: Arc<dyn StateStore>,
    runtime: Arc<dyn ContainerRuntime>,
    cache: StatsCache,
    config: StatsConfig,
    running: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl StatsCollector {
    pub fn new(
        store: Arc<dyn StateStore>,
        runtime: Arc<dyn ContainerRuntime>,
        cache: StatsCache,
        config: StatsConfig,
    ) -> Self {
        Self {
            store,
            runtime,
            cache,
            config,
            running: Arc::new(Mutex::new(false)),
            task: None,
        }
    }

    /// Cache written by this collector
    pub fn cache(&self) -> &StatsCache {
        &self.cache
    }

    /// Sample one server and store the reading.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unavailable` when the container exists but is not running
    /// or the server is no longer `Online`, and the runtime's error when the
    /// container cannot be inspected.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn poll(&self, id: ServerId) -> Result<RuntimeStats> {
        poll_one(&*self.store, &*self.runtime, &self.cache, id).await
    }

    /// Sample every `Online` server concurrently.
    ///
    /// Failures keep the previous cached value. Returns the number of servers sampled.
    #[tracing::instrument(skip(self))]
    pub async fn poll_all(&self) -> Result<usize> {
        poll_all(&*self.store, &*self.runtime, &self.cache).await
    }

    /// Start the background polling task
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut running = self.running.lock().await;
            if *running {
                return Ok(());
            }
            *running = true;
        }

        tracing::info!(interval = ?self.config.poll_interval, "Starting stats collector");

        let store = Arc::clone(&self.store);
        let runtime = Arc::clone(&self.runtime);
        let cache = self.cache.clone();
        let running = Arc::clone(&self.running);
        let poll_interval = self.config.poll_interval;

        self.task = Some(tokio::spawn(async move {
            let mut interval = time::interval(poll_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                if !*running.lock().await {
                    break;
                }

                if let Err(e) = poll_all(&*store, &*runtime, &cache).await {
                    tracing::warn!(error = %e, "Stats poll failed");
                }
            }
        }));

        Ok(())
    }

    /// Stop the background polling task
    pub async fn stop(&mut self) -> Result<()> {
        *self.running.lock().await = false;

        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("Stats collector stopped");
        }

        Ok(())
    }
}

impl Drop for StatsCollector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_one(
    store: &dyn StateStore,
    runtime: &dyn ContainerRuntime,
    cache: &StatsCache,
    id: ServerId,
) -> Result<RuntimeStats> {
    let snapshot = runtime.inspect(id).await?;
    if !snapshot.running {
        return Err(Error::Unavailable(format!("Server {} is not running", id)));
    }

    // the server may have stopped while the container was inspected
    let status = store.get(id).await?.status;
    if status != ServerStatus::Online {
        return Err(Error::Unavailable(format!("Server {} is {}", id, status)));
    }

    let stats = RuntimeStats {
        cpu_percent: snapshot.cpu_percent,
        memory_percent: snapshot.memory_percent,
        players_online: snapshot.players_online.unwrap_or(0),
    };
    cache.insert(id, stats).await;
    Ok(stats)
}

async fn poll_all(
    store: &dyn StateStore,
    runtime: &dyn ContainerRuntime,
    cache: &StatsCache,
) -> Result<usize> {
    let online: Vec<ServerId> = store
        .list()
        .await?
        .into_iter()
        .filter(|e| e.status == ServerStatus::Online)
        .map(|e| e.id)
        .collect();

    cache.retain(&online).await;

    let results = join_all(online.iter().map(|id| poll_one(store, runtime, cache, *id))).await;
    for (id, result) in online.iter().zip(results) {
        if let Err(e) = result {
            tracing::debug!(server_id = %id, error = %e, "Keeping previous stats");
        }
    }

    Ok(online.len())
}
