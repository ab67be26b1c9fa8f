//! Field data types

use serde::{Deserialize, Serialize};

/// Data type of an entity field, drives value coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
}

impl FieldType {
    /// Parse a column type hint (the part after `:` in `age:int`)
    ///
    /// Returns None for hints that don't name a known type.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "string" | "text" | "str" => Some(FieldType::String),
            "int" | "integer" => Some(FieldType::Integer),
            "float" | "decimal" | "number" => Some(FieldType::Decimal),
            "bool" | "boolean" => Some(FieldType::Boolean),
            "date" | "datetime" => Some(FieldType::DateTime),
            _ => None,
        }
    }

    /// Get display label
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::DateTime => "datetime",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hint() {
        assert_eq!(FieldType::from_hint("int"), Some(FieldType::Integer));
        assert_eq!(FieldType::from_hint("Integer"), Some(FieldType::Integer));
        assert_eq!(FieldType::from_hint("number"), Some(FieldType::Decimal));
        assert_eq!(FieldType::from_hint("date"), Some(FieldType::DateTime));
        assert_eq!(FieldType::from_hint("en"), None);
    }

    #[test]
    fn test_deserialize_lowercase() {
        let parsed: FieldType = serde_json::from_str("\"boolean\"").unwrap();
        assert_eq!(parsed, FieldType::Boolean);
    }
}
