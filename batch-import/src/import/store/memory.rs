//! In-process entity store

use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::EntityStore;
use crate::import::types::{Entity, EntityId, Value};

type Table = BTreeMap<EntityId, HashMap<String, Value>>;

#[derive(Debug)]
struct MemoryState {
    tables: HashMap<String, Table>,
    next_id: EntityId,
}

/// Entity store kept in memory, used for dry runs and tests
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            state: RwLock::new(MemoryState {
                tables: HashMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity directly, returning its new id
    pub async fn insert(&self, entity_type: &str, fields: HashMap<String, Value>) -> EntityId {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        state
            .tables
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, fields);
        id
    }

    /// All entities of a type, ordered by id
    pub async fn all(&self, entity_type: &str) -> Vec<Entity> {
        let state = self.state.read().await;
        state
            .tables
            .get(entity_type)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, fields)| Entity::with_id(*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of entities of a type
    pub async fn count(&self, entity_type: &str) -> usize {
        let state = self.state.read().await;
        state.tables.get(entity_type).map_or(0, |t| t.len())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find(&self, entity_type: &str, id: EntityId) -> Result<Option<Entity>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .get(entity_type)
            .and_then(|table| table.get(&id))
            .map(|fields| Entity::with_id(id, fields.clone())))
    }

    async fn exists_with(
        &self,
        entity_type: &str,
        values: &[(String, Value)],
        exclude: Option<EntityId>,
    ) -> Result<bool> {
        let state = self.state.read().await;
        let Some(table) = state.tables.get(entity_type) else {
            return Ok(false);
        };

        Ok(table.iter().any(|(id, fields)| {
            Some(*id) != exclude
                && values
                    .iter()
                    .all(|(field, value)| fields.get(field).unwrap_or(&Value::Null) == value)
        }))
    }

    async fn save_all(&self, entity_type: &str, entities: Vec<Entity>) -> Result<Vec<EntityId>> {
        let mut state = self.state.write().await;

        // Check every update target first so a failure leaves the table untouched
        for entity in &entities {
            if let Some(id) = entity.id {
                let exists = state
                    .tables
                    .get(entity_type)
                    .is_some_and(|table| table.contains_key(&id));
                if !exists {
                    bail!("Cannot update {} {}: entity does not exist", entity_type, id);
                }
            }
        }

        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            let id = match entity.id {
                Some(id) => id,
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    id
                }
            };
            state
                .tables
                .entry(entity_type.to_string())
                .or_default()
                .insert(id, entity.fields);
            ids.push(id);
        }

        Ok(ids)
    }
}
