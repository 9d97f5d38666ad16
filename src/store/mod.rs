//! State store for server entities.
//!
//! The store is the durable record of every entity's declared configuration and
//! last-known status. It guarantees per-entity atomic writes and serializes
//! concurrent updates to the same entity, but it does not know the state
//! machine: legality of a transition is the lifecycle manager's concern.
//!
//! Two implementations are provided:
//!
//! * [`MemoryStore`] - lock-guarded map, nothing survives the process
//! * [`JsonFileStore`] - the same map mirrored to a JSON document on every write
//!
//! # Examples
//!
//! ```no_run
//! use mc_panel::store::{JsonFileStore, StateStore};
//!
//! # async fn run() -> mc_panel::Result<()> {
//! let store = JsonFileStore::open("/minecraft/servers.json").await?;
//! for entity in store.list().await? {
//!     println!("{} is {}", entity.name, entity.status);
//! }
//! # Ok(())
//! # }
//! ```
mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::server::{ServerEntity, ServerId, ServerStatus};
use async_trait::async_trait;
use std::collections::HashMap;

/// Durable record of server entities
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert or replace an entity
    async fn put(&self, entity: ServerEntity) -> Result<()>;

    /// Fetch one entity, `ServerNotFound` when absent
    async fn get(&self, id: ServerId) -> Result<ServerEntity>;

    /// All entities, newest first
    async fn list(&self) -> Result<Vec<ServerEntity>>;

    /// Replace the status of an entity
    async fn update_status(&self, id: ServerId, status: ServerStatus) -> Result<()>;

    /// Record (or clear) the last asynchronous failure of an entity
    async fn record_error(&self, id: ServerId, error: Option<String>) -> Result<()>;
}

/// Entities of a map, newest first
pub(crate) fn sorted_entities(entities: &HashMap<ServerId, ServerEntity>) -> Vec<ServerEntity> {
    let mut list: Vec<ServerEntity> = entities.values().cloned().collect();
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    list
}
