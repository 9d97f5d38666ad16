use crate::error::{Error, Result};
use crate::server::{ServerEntity, ServerId, ServerStatus};
use crate::store::{StateStore, sorted_entities};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory state store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<ServerId, ServerEntity>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entities
    pub fn with_entities(entities: impl IntoIterator<Item = ServerEntity>) -> Self {
        let map = entities.into_iter().map(|e| (e.id, e)).collect();
        Self {
            entities: RwLock::new(map),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn put(&self, entity: ServerEntity) -> Result<()> {
        self.entities.write().await.insert(entity.id, entity);
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
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&id)
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))?;
        entity.status = status;
        Ok(())
    }

    async fn record_error(&self, id: ServerId, error: Option<String>) -> Result<()> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&id)
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))?;
        entity.last_error = error;
        Ok(())
    }
}
