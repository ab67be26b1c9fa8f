//! Conversion of raw cell values to typed field values

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::import::types::{FieldType, Value};

/// A cell value that can't be represented as the field's type
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionError {
    /// 1-based data row
    pub row: usize,
    pub column: String,
    pub expected: FieldType,
    pub value: Value,
}

impl std::fmt::Display for CoercionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}, column '{}': cannot convert {} '{}' to {}",
            self.row,
            self.column,
            self.value.kind(),
            self.value,
            self.expected
        )
    }
}

impl std::error::Error for CoercionError {}

/// Convert a value to the given field type
///
/// Blank input becomes `Null` for every type except `String`. Returns None
/// when the value can't be converted.
pub fn coerce(value: &Value, field_type: FieldType) -> Option<Value> {
    if field_type != FieldType::String && value.is_blank() {
        return Some(Value::Null);
    }

    match field_type {
        FieldType::String => Some(match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }),
        FieldType::Integer => match value {
            Value::Int(i) => Some(Value::Int(*i)),
            Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
                Some(Value::Int(*f as i64))
            }
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
            _ => None,
        },
        FieldType::Decimal => match value {
            Value::Int(i) => Some(Value::Float(*i as f64)),
            Value::Float(f) => Some(Value::Float(*f)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            _ => None,
        },
        FieldType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Int(0) => Some(Value::Bool(false)),
            Value::Int(1) => Some(Value::Bool(true)),
            Value::String(s) => parse_bool(s).map(Value::Bool),
            _ => None,
        },
        FieldType::DateTime => match value {
            Value::DateTime(dt) => Some(Value::DateTime(*dt)),
            Value::String(s) => parse_datetime(s).map(Value::DateTime),
            _ => None,
        },
    }
}

/// Convert a cell, reporting where it came from on failure
pub fn coerce_cell(
    value: &Value,
    field_type: FieldType,
    row: usize,
    column: &str,
) -> Result<Value, CoercionError> {
    coerce(value, field_type).ok_or_else(|| CoercionError {
        row,
        column: column.to_string(),
        expected: field_type,
        value: value.clone(),
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
