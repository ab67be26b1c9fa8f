//! Settings file loading
//!
//! Settings are read from the first existing file of:
//! 1. the path given on the command line
//! 2. `./batch-import.toml`
//! 3. `<config dir>/batch-import/config.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::import::config::{ConfigError, ImportConfiguration};
use crate::import::reader::ReaderOptions;
use crate::import::schema::SchemaRegistry;

/// Settings file looked up in the working directory
pub const LOCAL_SETTINGS_FILE: &str = "batch-import.toml";

/// Store connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// sqlx connection URL, e.g. `sqlite://data.db`
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    "sqlite://batch-import.db".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            database_url: default_database_url(),
        }
    }
}

/// Contents of a settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub import: ImportConfiguration,
    #[serde(default)]
    pub schema: SchemaRegistry,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub reader: ReaderOptions,
}

impl Settings {
    /// Locations searched for a settings file, in order
    pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit {
            return vec![path.to_path_buf()];
        }

        let mut paths = vec![PathBuf::from(LOCAL_SETTINGS_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("batch-import").join("config.toml"));
        }
        paths
    }

    /// Load and validate settings from the first existing candidate
    pub fn load(explicit: Option<&Path>) -> Result<(PathBuf, Settings), ConfigError> {
        let searched = Self::candidate_paths(explicit);
        let path = searched
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                searched: searched.clone(),
            })?;

        log::debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let settings = Self::parse(&content, &path)?;
        Ok((path, settings))
    }

    /// Parse and validate settings text
    pub fn parse(content: &str, path: &Path) -> Result<Settings, ConfigError> {
        let mut settings: Settings = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        settings.import = settings.validate()?;

        let entity_type = settings.import.entity_type.clone();
        settings
            .schema
            .apply_field_types(&entity_type, &settings.import.fields);
        Ok(settings)
    }

    /// Check the import configuration against the declared schema
    ///
    /// Returns the configuration with canonical field names.
    pub fn validate(&self) -> Result<ImportConfiguration, ConfigError> {
        let entity_type = &self.import.entity_type;
        if !entity_type.trim().is_empty() && self.schema.find_entity(entity_type).is_none() {
            return Err(ConfigError::UnknownEntityType {
                entity_type: entity_type.clone(),
            });
        }
        self.import.validated(&self.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::config::Rule;
    use crate::import::schema::FieldInspector;
    use crate::import::types::FieldType;

    const SETTINGS: &str = r#"
        [import]
        entity_type = "contact"
        allowed_extensions = ["csv"]

        [[import.rules]]
        kind = "unique"
        fields = ["mail"]

        [import.fields]
        score = "decimal"

        [[schema.entities]]
        name = "contact"

        [[schema.entities.fields]]
        name = "email"
        aliases = ["mail"]

        [[schema.entities.fields]]
        name = "score"

        [store]
        database_url = "sqlite://contacts.db"

        [reader]
        delimiter = ";"
    "#;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::parse(SETTINGS, Path::new("test.toml")).unwrap();

        assert_eq!(settings.import.rules, vec![Rule::unique(["email"])]);
        assert_eq!(settings.store.database_url, "sqlite://contacts.db");
        assert_eq!(settings.reader.delimiter, ';');
        assert!(!settings.import.accepts_extension("xlsx"));
        assert_eq!(
            settings.schema.field_type("contact", "score"),
            Some(FieldType::Decimal)
        );
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::parse(
            r#"
            [import]
            entity_type = "contact"

            [[schema.entities]]
            name = "contact"
            "#,
            Path::new("test.toml"),
        )
        .unwrap();

        assert_eq!(settings.store, StoreSettings::default());
        assert_eq!(settings.reader, ReaderOptions::default());
        assert!(settings.import.accepts_extension("ods"));
    }

    #[test]
    fn test_unknown_entity_type() {
        let err = Settings::parse(
            "[import]\nentity_type = \"invoice\"\n",
            Path::new("test.toml"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownEntityType {
                entity_type: "invoice".to_string()
            }
        );
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Settings::parse("[import", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join(format!("batch-import-{}.toml", uuid::Uuid::new_v4()));
        let err = Settings::load(Some(&path)).unwrap_err();
        assert_eq!(err, ConfigError::NotFound { searched: vec![path] });
    }

    #[test]
    fn test_load_from_explicit_path() {
        let path = std::env::temp_dir().join(format!("batch-import-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, SETTINGS).unwrap();
        let (loaded_from, settings) = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded_from, path);
        assert_eq!(settings.import.entity_type, "contact");
    }
}
