//! A single matrix row

use std::collections::HashMap;

use crate::import::types::Value;

use super::header::{RESERVED_ENTITY_COLUMN, is_reserved};

/// One row of the matrix: column -> value, plus the optional discriminator
/// stored under the reserved `entity` key
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based data row in the source (header excluded)
    row: usize,
    data: HashMap<String, Value>,
}

impl Record {
    pub fn new(row: usize, data: HashMap<String, Value>) -> Self {
        Record { row, data }
    }

    /// 1-based data row this record came from
    pub fn row(&self) -> usize {
        self.row
    }

    /// All data, including the discriminator if present
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }

    /// Value of the reserved `entity` column, unless missing or blank
    pub fn discriminator(&self) -> Option<&Value> {
        self.data
            .get(RESERVED_ENTITY_COLUMN)
            .filter(|value| !value.is_blank())
    }

    /// Column/value pairs excluding the discriminator
    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter().filter(|(key, _)| !is_reserved(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator() {
        let record = Record::new(
            1,
            HashMap::from([
                ("name".to_string(), Value::from("a")),
                ("entity".to_string(), Value::from("5")),
            ]),
        );
        assert_eq!(record.discriminator(), Some(&Value::from("5")));
        assert_eq!(record.columns().count(), 1);
        assert_eq!(record.data().len(), 2);
    }

    #[test]
    fn test_blank_discriminator_means_new() {
        let record = Record::new(
            2,
            HashMap::from([("entity".to_string(), Value::from("  "))]),
        );
        assert_eq!(record.discriminator(), None);
    }
}
