//! Normalized in-memory table built from one import file
//!
//! A `Matrix` holds the accepted header and one `Record` per usable row.
//! Header candidates that are blank, not strings, or the reserved `entity`
//! column are dropped. Row keys are cleaned the same way; the `entity` key is
//! kept in record data as the update discriminator.

mod column;
mod header;
mod record;

pub use column::ColumnName;
pub use header::{RESERVED_ENTITY_COLUMN, clean_column_name, is_reserved, normalize_header};
pub use record::Record;

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::import::schema::FieldInspector;
use crate::import::types::Value;

/// One raw input row as (key, value) pairs
pub type RawRow = Vec<(Value, Value)>;

static COLUMN_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w -]+(:\w+)?$").expect("column name pattern is valid")
});

/// Structural problem found by `Matrix::validate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixViolation {
    /// No usable column in the header
    EmptyHeader,
    /// No usable row in the file
    NoRecords,
    /// Column name doesn't match `name` or `name:type`
    InvalidColumnName { name: String },
    /// Same column appears more than once
    DuplicateColumnName { name: String },
}

impl std::fmt::Display for MatrixViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixViolation::EmptyHeader => write!(f, "The file has no valid column names."),
            MatrixViolation::NoRecords => write!(f, "The file contains no records."),
            MatrixViolation::InvalidColumnName { name } => write!(
                f,
                "Invalid column name \"{}\". Allowed are letters, digits, spaces, '-' and '_', optionally followed by ':type'.",
                name
            ),
            MatrixViolation::DuplicateColumnName { name } => {
                write!(f, "Column \"{}\" appears more than once.", name)
            }
        }
    }
}

impl std::error::Error for MatrixViolation {}

/// Header plus ordered records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix {
    header: Vec<String>,
    records: Vec<Record>,
}

impl Matrix {
    /// Build a matrix from raw header candidates and raw rows
    ///
    /// Row keys that are blank, not strings, or absent from the accepted
    /// header are dropped; the reserved `entity` key survives. Rows left
    /// without any key produce no record. Rows with valid keys but blank
    /// values are kept.
    pub fn build<I>(header_candidates: &[Value], rows: I) -> Self
    where
        I: IntoIterator<Item = RawRow>,
    {
        Self::build_numbered(
            header_candidates,
            rows.into_iter().enumerate().map(|(idx, row)| (idx + 1, row)),
        )
    }

    /// Like [`Matrix::build`], with the row number of each raw row given
    /// explicitly
    pub fn build_numbered<I>(header_candidates: &[Value], rows: I) -> Self
    where
        I: IntoIterator<Item = (usize, RawRow)>,
    {
        let header = normalize_header(header_candidates);
        let known: HashSet<&str> = header.iter().map(String::as_str).collect();

        let mut records = Vec::new();
        let mut dropped = 0usize;

        for (number, row) in rows {
            let data: HashMap<String, Value> = row
                .into_iter()
                .filter_map(|(key, value)| {
                    let key = clean_column_name(&key)?;
                    (is_reserved(&key) || known.contains(key.as_str())).then_some((key, value))
                })
                .collect();

            if data.is_empty() {
                dropped += 1;
                continue;
            }

            records.push(Record::new(number, data));
        }

        if dropped > 0 {
            log::debug!("Dropped {} rows without any valid column", dropped);
        }

        Matrix { header, records }
    }

    /// Accepted column names, in file order
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Records in file order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Map each header column to whether its field exists on the entity type
    pub fn header_info(&self, entity_type: &str, inspector: &dyn FieldInspector) -> Vec<(String, bool)> {
        self.header
            .iter()
            .map(|name| {
                let column = ColumnName::parse(name);
                let exists = inspector.field_exists(entity_type, column.field());
                (name.clone(), exists)
            })
            .collect()
    }

    /// Check the structural constraints of the matrix
    ///
    /// Returns every violation found; an empty list means the matrix can be
    /// imported.
    pub fn validate(&self) -> Vec<MatrixViolation> {
        let mut violations = Vec::new();

        if self.header.is_empty() {
            violations.push(MatrixViolation::EmptyHeader);
        }
        if self.records.is_empty() {
            violations.push(MatrixViolation::NoRecords);
        }

        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for name in &self.header {
            if !COLUMN_NAME_PATTERN.is_match(name) {
                violations.push(MatrixViolation::InvalidColumnName { name: name.clone() });
            }
            if !seen.insert(name.as_str()) && reported.insert(name.as_str()) {
                violations.push(MatrixViolation::DuplicateColumnName { name: name.clone() });
            }
        }

        violations
    }
}
