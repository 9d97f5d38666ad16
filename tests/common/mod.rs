#![allow(dead_code)]

use async_trait::async_trait;
use mc_panel::config::LifecycleConfig;
use mc_panel::error::{Error, Result};
use mc_panel::runtime::{ContainerRuntime, ContainerSnapshot, LaunchSpec, RuntimeHandle};
use mc_panel::server::{
    CreateServerRequest, Provisioner, ServerEntity, ServerId, ServerLifecycleManager,
    ServerSnapshot, ServerStatus, StatsCache,
};
use mc_panel::store::{MemoryStore, StateStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// In-process container runtime with switchable failure modes
pub struct FakeRuntime {
    pub launches: AtomicUsize,
    pub terminates: AtomicUsize,
    pub fail_launch: AtomicBool,
    pub fail_terminate: AtomicBool,
    pub hang_launch: AtomicBool,
    pub hang_terminate: AtomicBool,
    pub panic_launch: AtomicBool,
    pub panic_terminate: AtomicBool,
    pub inspect_unavailable: AtomicBool,
    gated: AtomicBool,
    gate: Semaphore,
    running: Mutex<HashSet<ServerId>>,
    exited: Mutex<HashSet<ServerId>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            launches: AtomicUsize::new(0),
            terminates: AtomicUsize::new(0),
            fail_launch: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
            hang_launch: AtomicBool::new(false),
            hang_terminate: AtomicBool::new(false),
            panic_launch: AtomicBool::new(false),
            panic_terminate: AtomicBool::new(false),
            inspect_unavailable: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            running: Mutex::new(HashSet::new()),
            exited: Mutex::new(HashSet::new()),
        })
    }

    /// Hold every launch until `release` is called
    pub fn hold_launches(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, launches: usize) {
        self.gate.add_permits(launches);
    }

    /// Mark a container as running without a launch
    pub fn set_running(&self, id: ServerId) {
        self.exited.lock().unwrap().remove(&id);
        self.running.lock().unwrap().insert(id);
    }

    /// Simulate a container removed behind the panel's back
    pub fn kill(&self, id: ServerId) {
        self.running.lock().unwrap().remove(&id);
        self.exited.lock().unwrap().remove(&id);
    }

    /// Simulate a container process exiting while the container stays present
    pub fn exit(&self, id: ServerId) {
        self.running.lock().unwrap().remove(&id);
        self.exited.lock().unwrap().insert(id);
    }

    pub fn is_running(&self, id: ServerId) -> bool {
        self.running.lock().unwrap().contains(&id)
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn terminate_count(&self) -> usize {
        self.terminates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn launch(&self, spec: &LaunchSpec) -> Result<RuntimeHandle> {
        self.launches.fetch_add(1, Ordering::SeqCst);

        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        if self.hang_launch.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.panic_launch.load(Ordering::SeqCst) {
            panic!("launch exploded");
        }
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(Error::ResourceExhausted(
                "Bind for 0.0.0.0:25565 failed: port is already allocated".to_string(),
            ));
        }

        self.set_running(spec.id);
        Ok(RuntimeHandle {
            container_name: spec.id.container_name("minecraft-server"),
            container_id: "c0ffee".to_string(),
        })
    }

    async fn terminate(&self, id: ServerId) -> Result<()> {
        self.terminates.fetch_add(1, Ordering::SeqCst);

        if self.hang_terminate.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.panic_terminate.load(Ordering::SeqCst) {
            panic!("terminate exploded");
        }
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(Error::TerminateFailed("container refused to stop".to_string()));
        }

        self.kill(id);
        Ok(())
    }

    async fn inspect(&self, id: ServerId) -> Result<ContainerSnapshot> {
        if self.inspect_unavailable.load(Ordering::SeqCst) {
            return Err(Error::RuntimeUnavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ));
        }

        if self.is_running(id) {
            Ok(ContainerSnapshot {
                running: true,
                cpu_percent: 12.5,
                memory_percent: 40.0,
                players_online: Some(3),
            })
        } else if self.exited.lock().unwrap().contains(&id) {
            Ok(ContainerSnapshot::default())
        } else {
            Err(Error::ContainerNotFound(id.to_string()))
        }
    }
}

/// `MemoryStore` whose status writes can be made to fail
pub struct FlakyStore {
    inner: MemoryStore,
    failing_status_writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            failing_status_writes: AtomicUsize::new(0),
        })
    }

    /// Fail the next `count` calls to `update_status`
    pub fn fail_status_writes(&self, count: usize) {
        self.failing_status_writes.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn put(&self, entity: ServerEntity) -> Result<()> {
        self.inner.put(entity).await
    }

    async fn get(&self, id: ServerId) -> Result<ServerEntity> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<ServerEntity>> {
        self.inner.list().await
    }

    async fn update_status(&self, id: ServerId, status: ServerStatus) -> Result<()> {
        let failing = self
            .failing_status_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Storage("disk full".to_string()));
        }
        self.inner.update_status(id, status).await
    }

    async fn record_error(&self, id: ServerId, error: Option<String>) -> Result<()> {
        self.inner.record_error(id, error).await
    }
}

/// A lifecycle manager wired to a `FakeRuntime` and a `MemoryStore`
pub struct Harness {
    pub manager: ServerLifecycleManager,
    pub runtime: Arc<FakeRuntime>,
    pub store: Arc<MemoryStore>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(lifecycle_config(Duration::from_secs(5)))
    }

    pub fn with_config(config: LifecycleConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }

    pub fn with_store(store: MemoryStore, config: LifecycleConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::new();
        let store = Arc::new(store);

        let store_dyn: Arc<dyn StateStore> = store.clone();
        let runtime_dyn: Arc<dyn ContainerRuntime> = runtime.clone();
        let manager = ServerLifecycleManager::new(
            store_dyn,
            runtime_dyn,
            Provisioner::new(dir.path(), 25565),
            StatsCache::new(),
            config,
        );

        Self {
            manager,
            runtime,
            store,
            dir,
        }
    }

    pub fn runtime_dyn(&self) -> Arc<dyn ContainerRuntime> {
        self.runtime.clone()
    }

    pub fn store_dyn(&self) -> Arc<dyn StateStore> {
        self.store.clone()
    }

    /// Create a server and drive it to `Online`
    pub async fn online_server(&self, name: &str, port: u16) -> ServerId {
        let id = self.manager.create(request(name, port)).await.unwrap().id();
        self.manager.start(id).await.unwrap();
        wait_for_status(&self.manager, id, ServerStatus::Online).await;
        id
    }
}

pub fn lifecycle_config(timeout: Duration) -> LifecycleConfig {
    LifecycleConfig {
        launch_timeout: timeout,
        terminate_timeout: timeout,
        ..Default::default()
    }
}

pub fn request(name: &str, port: u16) -> CreateServerRequest {
    CreateServerRequest {
        name: Some(name.to_string()),
        version: Some("1.20.4".to_string()),
        memory: Some(1024),
        port: Some(port),
        max_players: Some(20),
        ..Default::default()
    }
}

/// Poll until the server reaches `status`, panicking after five seconds
pub async fn wait_for_status(
    manager: &ServerLifecycleManager,
    id: ServerId,
    status: ServerStatus,
) -> ServerSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = manager.get(id).await.unwrap();
        if snapshot.status() == status {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "server {} stuck in {} while waiting for {}",
                id,
                snapshot.status(),
                status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
