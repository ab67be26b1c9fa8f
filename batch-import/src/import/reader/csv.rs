//! CSV reader

use std::io::Read;

use super::{RawTable, ReadError, ReaderOptions};
use crate::import::types::Value;

/// Read CSV data; every cell becomes a string value
///
/// Rows may have differing lengths. A leading UTF-8 byte order mark is
/// ignored.
pub fn read_csv<R: Read>(reader: R, options: &ReaderOptions) -> Result<RawTable, ReadError> {
    let delimiter = u8::try_from(options.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(ReadError::InvalidDelimiter {
            delimiter: options.delimiter,
        })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let mut rows: Vec<(usize, Vec<Value>)> = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // Empty lines are skipped by the csv reader; the line keeps numbering
        // aligned with the file
        let line = record
            .position()
            .map_or(index + 1, |p| p.line() as usize);
        let first = rows.is_empty();
        let cells = record
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let cell = if first && i == 0 {
                    cell.trim_start_matches('\u{feff}')
                } else {
                    cell
                };
                Value::String(cell.to_string())
            })
            .collect();
        rows.push((line, cells));
    }

    let table = RawTable::from_positioned_rows(rows);
    log::debug!(
        "Read CSV with {} columns and {} rows",
        table.header.len(),
        table.rows.len()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv() {
        let data = "name,age,entity\nAnn,30,\n\nBob,,5\n";
        let table = read_csv(data.as_bytes(), &ReaderOptions::default()).unwrap();

        assert_eq!(
            table.header,
            vec![Value::from("name"), Value::from("age"), Value::from("entity")]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].cells[2], Value::from("5"));
        // The empty line between the two rows still counts
        assert_eq!(table.rows[1].number, 3);
    }

    #[test]
    fn test_read_csv_with_delimiter_and_short_rows() {
        let data = "a;b\n1\n2;3\n";
        let options = ReaderOptions { delimiter: ';' };
        let table = read_csv(data.as_bytes(), &options).unwrap();

        assert_eq!(table.rows[0].cells, vec![Value::from("1")]);
        assert_eq!(table.rows[1].cells, vec![Value::from("2"), Value::from("3")]);
    }

    #[test]
    fn test_read_csv_skips_rows_of_separators() {
        let data = "a,b\n,\n1,2\n";
        let table = read_csv(data.as_bytes(), &ReaderOptions::default()).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_byte_order_mark_ignored() {
        let data = "\u{feff}name\nAnn\n";
        let table = read_csv(data.as_bytes(), &ReaderOptions::default()).unwrap();
        assert_eq!(table.header, vec![Value::from("name")]);
    }

    #[test]
    fn test_invalid_delimiter() {
        let options = ReaderOptions { delimiter: 'é' };
        let err = read_csv("a".as_bytes(), &options).unwrap_err();
        assert!(matches!(err, ReadError::InvalidDelimiter { .. }));
    }
}
