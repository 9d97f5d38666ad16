use crate::error::{Error, Result};
use crate::server::{ServerEntity, ServerId, ServerStatus};
use crate::store::{StateStore, sorted_entities};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// State store persisted as a single JSON document.
///
/// Entities are kept in memory and the whole document is rewritten after every
/// mutation: serialized to `<file>.tmp`, then renamed over the target so a
/// reader never observes a partially written file. The write lock is held
/// across the flush, which serializes concurrent mutations.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entities: RwLock<HashMap<ServerId, ServerEntity>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file exists but cannot be read, and
    /// `Error::Serialization` if its contents are not a valid entity list.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entities = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => {
                let list: Vec<ServerEntity> = serde_json::from_str(&content).map_err(|e| {
                    Error::Serialization(format!(
                        "Failed to parse state file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                list.into_iter().map(|e| (e.id, e)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No state file found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read state file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::debug!(count = entities.len(), "Loaded server entities");
        Ok(Self {
            path,
            entities: RwLock::new(entities),
        })
    }

    /// Location of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entities: &HashMap<ServerId, ServerEntity>) -> Result<()> {
        let body = serde_json::to_vec_pretty(&sorted_entities(entities))
            .map_err(|e| Error::Serialization(format!("Failed to serialize state: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }

    async fn modify<F>(&self, id: ServerId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut ServerEntity) + Send,
    {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&id)
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))?;
        let previous = entity.clone();
        apply(entity);

        if let Err(e) = self.flush(&entities).await {
            entities.insert(id, previous);
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn put(&self, entity: ServerEntity) -> Result<()> {
        let mut entities = self.entities.write().await;
        let id = entity.id;
        let previous = entities.insert(id, entity);

        if let Err(e) = self.flush(&entities).await {
            match previous {
                Some(previous) => entities.insert(id, previous),
                None => entities.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: ServerId) -> Result<ServerEntity> {
        self.entities
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<ServerEntity>> {
        Ok(sorted_entities(&*self.entities.read().await))
    }

    async fn update_status(&self, id: ServerId, status: ServerStatus) -> Result<()> {
        self.modify(id, |entity| entity.status = status).await
    }

    async fn record_error(&self, id: ServerId, error: Option<String>) -> Result<()> {
        self.modify(id, |entity| entity.last_error = error).await
    }
}
