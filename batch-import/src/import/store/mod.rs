//! Persistence collaborators
//!
//! The importer reads the store to resolve update targets and detect
//! duplicates, then writes every accepted entity through `save_all`, which
//! must be all-or-nothing.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::import::types::{Entity, EntityId, Value};

/// Persistence operations needed by the importer
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Find an entity by id
    async fn find(&self, entity_type: &str, id: EntityId) -> Result<Option<Entity>>;

    /// Whether an entity exists whose fields equal every (field, value) pair,
    /// ignoring the entity with id `exclude`
    async fn exists_with(
        &self,
        entity_type: &str,
        values: &[(String, Value)],
        exclude: Option<EntityId>,
    ) -> Result<bool>;

    /// Insert entities without id, update entities with id, atomically
    ///
    /// Returns the ids in input order.
    async fn save_all(&self, entity_type: &str, entities: Vec<Entity>) -> Result<Vec<EntityId>>;

    /// Save a single entity
    async fn save(&self, entity_type: &str, entity: Entity) -> Result<EntityId> {
        let ids = self.save_all(entity_type, vec![entity]).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Store returned no id for saved entity"))
    }
}
