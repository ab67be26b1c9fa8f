//! Persisted entity representation

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Value;

/// Identifier of a persisted entity
pub type EntityId = i64;

/// An entity as seen by the store: optional id plus field values
///
/// `id` is None until the entity has been saved for the first time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Option<EntityId>,
    pub fields: HashMap<String, Value>,
}

impl Entity {
    /// Create a new, not yet persisted entity
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Entity { id: None, fields }
    }

    /// Create an entity that already has an id
    pub fn with_id(id: EntityId, fields: HashMap<String, Value>) -> Self {
        Entity {
            id: Some(id),
            fields,
        }
    }

    /// Get a field value
    pub fn get_field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field value
    pub fn set_field(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Overlay the given values on top of the current ones
    pub fn merge(&mut self, values: &HashMap<String, Value>) {
        for (field, value) in values {
            self.fields.insert(field.clone(), value.clone());
        }
    }

    /// Whether the entity has been persisted
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_only_given_fields() {
        let mut entity = Entity::with_id(
            3,
            HashMap::from([
                ("name".to_string(), Value::from("old")),
                ("email".to_string(), Value::from("a@b.c")),
            ]),
        );
        entity.merge(&HashMap::from([("name".to_string(), Value::from("new"))]));

        assert_eq!(entity.get_field("name"), Some(&Value::from("new")));
        assert_eq!(entity.get_field("email"), Some(&Value::from("a@b.c")));
        assert!(entity.is_persisted());
    }
}
