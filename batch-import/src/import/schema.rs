//! Entity field introspection
//!
//! The importer never inspects entities itself: it asks a `FieldInspector`
//! whether a column names a field on the target entity type. `SchemaRegistry`
//! answers from static metadata declared in the settings file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::import::types::FieldType;

/// Capability to tell whether an entity type has a given field
pub trait FieldInspector {
    /// Whether `field` (or one of its declared alternate names) exists on
    /// `entity_type`
    fn field_exists(&self, entity_type: &str, field: &str) -> bool;

    /// Canonical field name a column maps to
    ///
    /// Defaults to the column name itself when the field exists.
    fn resolve_field(&self, entity_type: &str, field: &str) -> Option<String> {
        self.field_exists(entity_type, field)
            .then(|| field.to_string())
    }

    /// Declared type of a field, if known
    fn field_type(&self, _entity_type: &str, _field: &str) -> Option<FieldType> {
        None
    }
}

/// Static metadata of one entity field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    /// Declared type; untyped fields take their type from the import
    /// configuration or the column hint
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    /// Alternate column names that map to this field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldSchema {
            name: name.into(),
            field_type: Some(field_type),
            aliases: Vec::new(),
        }
    }

    /// A field without declared type
    pub fn untyped(name: impl Into<String>) -> Self {
        FieldSchema {
            name: name.into(),
            field_type: None,
            aliases: Vec::new(),
        }
    }

    /// Type used for storage, `String` when undeclared
    pub fn storage_type(&self) -> FieldType {
        self.field_type.unwrap_or_default()
    }

    /// Add an alternate column name
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Whether a column name refers to this field
    ///
    /// Exact name or alias first, then a loose comparison that ignores case,
    /// '_', '-' and spaces (so `firstName`, `first-name` and `first_name`
    /// all match).
    fn matches(&self, column: &str) -> bool {
        if self.name == column || self.aliases.iter().any(|a| a == column) {
            return true;
        }
        let key = loose_key(column);
        !key.is_empty()
            && (loose_key(&self.name) == key || self.aliases.iter().any(|a| loose_key(a) == key))
    }
}

/// Static metadata of one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        EntitySchema {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Find the field a column refers to
    pub fn find_field(&self, column: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.name == column)
            .or_else(|| self.fields.iter().find(|f| f.matches(column)))
    }
}

/// Collection of entity schemas, the settings-file backed `FieldInspector`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    #[serde(default)]
    pub entities: Vec<EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity schema
    pub fn add_entity(&mut self, entity: EntitySchema) {
        self.entities.push(entity);
    }

    /// Find an entity schema by name
    pub fn find_entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Give untyped fields of an entity the configured types
    pub fn apply_field_types(&mut self, entity_type: &str, types: &BTreeMap<String, FieldType>) {
        let Some(entity) = self.entities.iter_mut().find(|e| e.name == entity_type) else {
            return;
        };
        for field in entity.fields.iter_mut().filter(|f| f.field_type.is_none()) {
            if let Some(field_type) = types.get(&field.name) {
                field.field_type = Some(*field_type);
            }
        }
    }
}

impl FieldInspector for SchemaRegistry {
    fn field_exists(&self, entity_type: &str, field: &str) -> bool {
        self.find_entity(entity_type)
            .and_then(|e| e.find_field(field))
            .is_some()
    }

    fn resolve_field(&self, entity_type: &str, field: &str) -> Option<String> {
        self.find_entity(entity_type)?
            .find_field(field)
            .map(|f| f.name.clone())
    }

    fn field_type(&self, entity_type: &str, field: &str) -> Option<FieldType> {
        self.find_entity(entity_type)?
            .find_field(field)
            .and_then(|f| f.field_type)
    }
}

fn loose_key(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.add_entity(
            EntitySchema::new("person")
                .with_field(FieldSchema::new("name", FieldType::String))
                .with_field(FieldSchema::new("age", FieldType::Integer).with_alias("years"))
                .with_field(FieldSchema::new("first_name", FieldType::String)),
        );
        registry
    }

    #[test]
    fn test_field_exists() {
        let registry = registry();
        assert!(registry.field_exists("person", "name"));
        assert!(!registry.field_exists("person", "email"));
        assert!(!registry.field_exists("company", "name"));
    }

    #[test]
    fn test_alias_resolves_to_field() {
        let registry = registry();
        assert!(registry.field_exists("person", "years"));
        assert_eq!(registry.resolve_field("person", "years"), Some("age".to_string()));
        assert_eq!(registry.field_type("person", "years"), Some(FieldType::Integer));
    }

    #[test]
    fn test_loose_name_matching() {
        let registry = registry();
        assert_eq!(
            registry.resolve_field("person", "firstName"),
            Some("first_name".to_string())
        );
        assert_eq!(
            registry.resolve_field("person", "first-name"),
            Some("first_name".to_string())
        );
        assert_eq!(registry.resolve_field("person", "___"), None);
    }

    #[test]
    fn test_default_resolve_field() {
        struct OnlyName;
        impl FieldInspector for OnlyName {
            fn field_exists(&self, _entity_type: &str, field: &str) -> bool {
                field == "name"
            }
        }

        assert_eq!(OnlyName.resolve_field("x", "name"), Some("name".to_string()));
        assert_eq!(OnlyName.resolve_field("x", "other"), None);
        assert_eq!(OnlyName.field_type("x", "name"), None);
    }

    #[test]
    fn test_deserialize_from_toml() {
        let registry: SchemaRegistry = toml::from_str(
            r#"
            [[entities]]
            name = "person"

            [[entities.fields]]
            name = "age"
            type = "integer"
            aliases = ["years"]

            [[entities.fields]]
            name = "name"
            "#,
        )
        .unwrap();

        let person = registry.find_entity("person").unwrap();
        assert_eq!(person.fields.len(), 2);
        assert_eq!(person.fields[0].field_type, Some(FieldType::Integer));
        assert_eq!(person.fields[1].field_type, None);
        assert_eq!(person.fields[1].storage_type(), FieldType::String);
    }

    #[test]
    fn test_apply_field_types_only_fills_untyped() {
        let mut registry = SchemaRegistry::new();
        registry.add_entity(
            EntitySchema::new("person")
                .with_field(FieldSchema::untyped("score"))
                .with_field(FieldSchema::new("age", FieldType::Integer)),
        );
        let types = BTreeMap::from([
            ("score".to_string(), FieldType::Decimal),
            ("age".to_string(), FieldType::String),
        ]);

        registry.apply_field_types("person", &types);

        assert_eq!(registry.field_type("person", "score"), Some(FieldType::Decimal));
        assert_eq!(registry.field_type("person", "age"), Some(FieldType::Integer));
    }
}
