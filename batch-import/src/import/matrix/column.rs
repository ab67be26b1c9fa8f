//! Column name parsing (`field` or `field:hint`)

use crate::import::types::FieldType;

/// A header column split into its field name and optional type hint
///
/// Examples:
/// - "email" -> field "email", no hint
/// - "age:int" -> field "age", hint "int"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnName {
    field: String,
    hint: Option<String>,
}

impl ColumnName {
    /// Parse a normalized column name
    pub fn parse(column: &str) -> Self {
        match column.split_once(':') {
            Some((field, hint)) => ColumnName {
                field: field.trim().to_string(),
                hint: Some(hint.trim().to_string()).filter(|h| !h.is_empty()),
            },
            None => ColumnName {
                field: column.trim().to_string(),
                hint: None,
            },
        }
    }

    /// The field part of the column
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The raw hint after `:`, if any
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// The hint interpreted as a field type
    pub fn type_hint(&self) -> Option<FieldType> {
        self.hint.as_deref().and_then(FieldType::from_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let column = ColumnName::parse("email");
        assert_eq!(column.field(), "email");
        assert_eq!(column.hint(), None);
        assert_eq!(column.type_hint(), None);
    }

    #[test]
    fn test_parse_with_hint() {
        let column = ColumnName::parse("age:int");
        assert_eq!(column.field(), "age");
        assert_eq!(column.hint(), Some("int"));
        assert_eq!(column.type_hint(), Some(FieldType::Integer));
    }

    #[test]
    fn test_unknown_hint_has_no_type() {
        let column = ColumnName::parse("title:en");
        assert_eq!(column.field(), "title");
        assert_eq!(column.hint(), Some("en"));
        assert_eq!(column.type_hint(), None);
    }

    #[test]
    fn test_empty_hint_ignored() {
        assert_eq!(ColumnName::parse("name:").hint(), None);
    }
}
