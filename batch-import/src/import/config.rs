//! Per-deployment import configuration

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::import::schema::FieldInspector;
use crate::import::types::FieldType;

/// File extensions accepted when no allow-list is configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "ods"];

/// A validation rule evaluated against every record of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// The fields together must be unique among persisted entities and
    /// among the records of the batch
    Unique { fields: Vec<String> },
    /// None of the fields may be null or blank
    NotBlank { fields: Vec<String> },
}

impl Rule {
    /// Create a uniqueness rule
    pub fn unique<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::Unique {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a not-blank rule
    pub fn not_blank<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::NotBlank {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Fields the rule applies to
    pub fn fields(&self) -> &[String] {
        match self {
            Rule::Unique { fields } | Rule::NotBlank { fields } => fields,
        }
    }

    fn fields_mut(&mut self) -> &mut Vec<String> {
        match self {
            Rule::Unique { fields } | Rule::NotBlank { fields } => fields,
        }
    }

    /// Get display label
    pub fn label(&self) -> &'static str {
        match self {
            Rule::Unique { .. } => "unique",
            Rule::NotBlank { .. } => "not_blank",
        }
    }
}

/// What to import and how to validate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfiguration {
    /// Target entity type name
    pub entity_type: String,
    /// Rules, evaluated in this order
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Field type overrides (field -> type) for fields the schema leaves
    /// untyped; they win over header hints
    #[serde(default)]
    pub fields: BTreeMap<String, FieldType>,
    /// Accepted file extensions (lowercase, without dot)
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl ImportConfiguration {
    /// Create a configuration without rules
    pub fn new(entity_type: impl Into<String>) -> Self {
        ImportConfiguration {
            entity_type: entity_type.into(),
            rules: Vec::new(),
            fields: BTreeMap::new(),
            allowed_extensions: default_extensions(),
        }
    }

    /// Add a rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Override the type of a field
    pub fn with_field_type(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(field.into(), field_type);
        self
    }

    /// Uniqueness rules in configuration order
    pub fn unique_rules(&self) -> impl Iterator<Item = &[String]> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Unique { fields } => Some(fields.as_slice()),
            Rule::NotBlank { .. } => None,
        })
    }

    /// Whether a file extension is accepted (case-insensitive)
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Check the configuration against the entity schema
    ///
    /// Returns a copy where every field name is replaced by the canonical
    /// name reported by the inspector.
    pub fn validated(&self, inspector: &dyn FieldInspector) -> Result<Self, ConfigError> {
        if self.entity_type.trim().is_empty() {
            return Err(ConfigError::MissingEntityType);
        }

        let mut resolved = self.clone();

        for (index, rule) in resolved.rules.iter_mut().enumerate() {
            if rule.fields().is_empty() {
                return Err(ConfigError::EmptyRule { index });
            }
            for field in rule.fields_mut() {
                *field = self.resolve(inspector, field)?;
            }
        }

        let mut fields = BTreeMap::new();
        for (field, field_type) in &self.fields {
            let canonical = self.resolve(inspector, field)?;
            match inspector.field_type(&self.entity_type, &canonical) {
                Some(declared) if declared != *field_type => {
                    return Err(ConfigError::ConflictingFieldType {
                        field: canonical,
                        configured: *field_type,
                        declared,
                    });
                }
                _ => {}
            }
            fields.insert(canonical, *field_type);
        }
        resolved.fields = fields;

        Ok(resolved)
    }

    fn resolve(&self, inspector: &dyn FieldInspector, field: &str) -> Result<String, ConfigError> {
        inspector
            .resolve_field(&self.entity_type, field)
            .ok_or_else(|| ConfigError::UnknownField {
                entity_type: self.entity_type.clone(),
                field: field.to_string(),
            })
    }
}

/// Configuration problem, fatal before any row is processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No settings file at any of the searched locations
    NotFound { searched: Vec<PathBuf> },
    /// Settings file couldn't be read
    Read { path: PathBuf, message: String },
    /// Settings file isn't valid TOML for the expected structure
    Parse { path: PathBuf, message: String },
    /// `entity_type` is empty
    MissingEntityType,
    /// No schema declared for the configured entity type
    UnknownEntityType { entity_type: String },
    /// A rule lists no fields
    EmptyRule { index: usize },
    /// A rule or type override names a field the entity doesn't have
    UnknownField { entity_type: String, field: String },
    /// A type override contradicts the type declared by the schema
    ConflictingFieldType {
        field: String,
        configured: FieldType,
        declared: FieldType,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound { searched } => {
                let paths: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
                write!(
                    f,
                    "Import configuration not found (searched: {})",
                    paths.join(", ")
                )
            }
            ConfigError::Read { path, message } => {
                write!(f, "Failed to read configuration {}: {}", path.display(), message)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Invalid configuration {}: {}", path.display(), message)
            }
            ConfigError::MissingEntityType => {
                write!(f, "Import configuration has no entity_type")
            }
            ConfigError::UnknownEntityType { entity_type } => {
                write!(f, "No schema declared for entity type '{}'", entity_type)
            }
            ConfigError::EmptyRule { index } => {
                write!(f, "Rule #{} has no fields", index + 1)
            }
            ConfigError::UnknownField { entity_type, field } => {
                write!(f, "Entity type '{}' has no field '{}'", entity_type, field)
            }
            ConfigError::ConflictingFieldType {
                field,
                configured,
                declared,
            } => write!(
                f,
                "Field '{}' is configured as {} but declared as {}",
                field, configured, declared
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::schema::{EntitySchema, FieldSchema, SchemaRegistry};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.add_entity(
            EntitySchema::new("contact")
                .with_field(FieldSchema::new("email", FieldType::String).with_alias("mail"))
                .with_field(FieldSchema::new("age", FieldType::Integer)),
        );
        registry
    }

    #[test]
    fn test_deserialize_rules_in_order() {
        let config: ImportConfiguration = toml::from_str(
            r#"
            entity_type = "contact"

            [[rules]]
            kind = "unique"
            fields = ["email"]

            [[rules]]
            kind = "not_blank"
            fields = ["age"]

            [fields]
            age = "integer"
            "#,
        )
        .unwrap();

        assert_eq!(config.rules[0], Rule::unique(["email"]));
        assert_eq!(config.rules[1], Rule::not_blank(["age"]));
        assert_eq!(config.fields.get("age"), Some(&FieldType::Integer));
        assert!(config.accepts_extension("CSV"));
        assert!(!config.accepts_extension("txt"));
    }

    #[test]
    fn test_validated_resolves_aliases() {
        let config = ImportConfiguration::new("contact").with_rule(Rule::unique(["mail"]));
        let resolved = config.validated(&registry()).unwrap();
        assert_eq!(resolved.rules[0].fields(), &["email".to_string()]);
    }

    #[test]
    fn test_validated_rejects_unknown_field() {
        let config = ImportConfiguration::new("contact").with_rule(Rule::unique(["phone"]));
        assert_eq!(
            config.validated(&registry()),
            Err(ConfigError::UnknownField {
                entity_type: "contact".to_string(),
                field: "phone".to_string(),
            })
        );
    }

    #[test]
    fn test_validated_rejects_empty_rule_and_entity_type() {
        let config = ImportConfiguration::new("contact").with_rule(Rule::Unique { fields: vec![] });
        assert_eq!(
            config.validated(&registry()),
            Err(ConfigError::EmptyRule { index: 0 })
        );

        let config = ImportConfiguration::new("  ");
        assert_eq!(
            config.validated(&registry()),
            Err(ConfigError::MissingEntityType)
        );
    }

    #[test]
    fn test_validated_rejects_conflicting_type() {
        let config = ImportConfiguration::new("contact").with_field_type("age", FieldType::Decimal);
        assert_eq!(
            config.validated(&registry()),
            Err(ConfigError::ConflictingFieldType {
                field: "age".to_string(),
                configured: FieldType::Decimal,
                declared: FieldType::Integer,
            })
        );

        let config = ImportConfiguration::new("contact").with_field_type("age", FieldType::Integer);
        assert!(config.validated(&registry()).is_ok());
    }

    #[test]
    fn test_unique_rules_keep_order() {
        let config = ImportConfiguration::new("contact")
            .with_rule(Rule::unique(["a", "b"]))
            .with_rule(Rule::not_blank(["c"]))
            .with_rule(Rule::unique(["d"]));

        let rules: Vec<&[String]> = config.unique_rules().collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], &["a".to_string(), "b".to_string()]);
        assert_eq!(rules[1], &["d".to_string()]);
    }
}
