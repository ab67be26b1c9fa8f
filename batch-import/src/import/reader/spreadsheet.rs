//! Spreadsheet reader (xlsx, xls, ods), first sheet only

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{Duration, NaiveDate};

use super::{RawTable, ReadError};
use crate::import::types::Value;

/// Read the first worksheet of a workbook
pub fn read_spreadsheet(path: &Path) -> Result<RawTable, ReadError> {
    let spreadsheet_error = |message: String| ReadError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| spreadsheet_error(e.to_string()))?,
        None => return Err(spreadsheet_error("workbook has no worksheets".to_string())),
    };

    let table = RawTable::from_rows(range.rows().map(|row| row.iter().map(cell_to_value).collect()));
    log::debug!(
        "Read {} with {} columns and {} rows",
        path.display(),
        table.header.len(),
        table.rows.len()
    );
    Ok(table)
}

/// Convert a spreadsheet cell to a value
fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => {
            if dt.is_datetime() {
                serial_to_datetime(dt.as_f64()).unwrap_or(Value::Float(dt.as_f64()))
            } else {
                Value::Float(dt.as_f64())
            }
        }
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

/// Whole numbers are stored as floats by spreadsheets
fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

/// Convert a spreadsheet serial date (days since 1899-12-30) to UTC
fn serial_to_datetime(serial: f64) -> Option<Value> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() {
        return None;
    }
    let datetime = epoch.checked_add_signed(Duration::milliseconds(millis as i64))?;
    Some(Value::DateTime(datetime.and_utc()))
}
