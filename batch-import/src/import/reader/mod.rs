//! Reading import files into raw tables
//!
//! The first row of a file is the header; every following row is paired with
//! it cell by cell. Rows whose cells are all blank are skipped here, so they
//! never reach the matrix.

mod csv;
mod spreadsheet;

pub use self::csv::read_csv;
pub use self::spreadsheet::read_spreadsheet;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::import::matrix::{Matrix, RawRow};
use crate::import::types::Value;

/// User-facing message for files with an unsupported extension
pub const WRONG_FILE_EXTENSION: &str = "Wrong file extension.";

/// Format of an import file, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    /// xlsx, xls or ods
    Spreadsheet,
}

impl FileKind {
    /// Detect the format from an extension (case-insensitive, without dot)
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" | "xls" | "ods" => Some(FileKind::Spreadsheet),
            _ => None,
        }
    }

    /// Detect the format of a path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Reader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// CSV field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            delimiter: default_delimiter(),
        }
    }
}

/// Failure to turn a file into a raw table
#[derive(Debug)]
pub enum ReadError {
    /// Extension isn't a supported or allowed format
    WrongExtension { path: PathBuf },
    /// Delimiter isn't a single ASCII character
    InvalidDelimiter { delimiter: char },
    Io { path: PathBuf, source: std::io::Error },
    Csv(::csv::Error),
    Spreadsheet { path: PathBuf, message: String },
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::WrongExtension { .. } => write!(f, "{}", WRONG_FILE_EXTENSION),
            ReadError::InvalidDelimiter { delimiter } => {
                write!(f, "Delimiter '{}' is not a single ASCII character", delimiter)
            }
            ReadError::Io { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ReadError::Csv(e) => write!(f, "Invalid CSV: {}", e),
            ReadError::Spreadsheet { path, message } => {
                write!(f, "Failed to read spreadsheet {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io { source, .. } => Some(source),
            ReadError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<::csv::Error> for ReadError {
    fn from(e: ::csv::Error) -> Self {
        ReadError::Csv(e)
    }
}

/// One data row and where it sits in the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    /// 1-based position below the header, counting skipped blank rows
    pub number: usize,
    pub cells: Vec<Value>,
}

/// Header row plus data rows, cells as read from the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub header: Vec<Value>,
    pub rows: Vec<TableRow>,
}

impl RawTable {
    /// Build a table from consecutive rows, the first non-blank one being
    /// the header
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        Self::from_positioned_rows(rows.into_iter().enumerate().map(|(i, row)| (i + 1, row)))
    }

    /// Build a table from rows tagged with their 1-based position in the
    /// file (line or sheet row)
    ///
    /// Data row numbers are positions relative to the header, so blank rows
    /// that are skipped still count.
    pub fn from_positioned_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<Value>)>,
    {
        let mut rows = rows.into_iter().filter(|(_, row)| !is_blank_row(row));
        let Some((header_position, header)) = rows.next() else {
            return RawTable::default();
        };
        RawTable {
            header,
            rows: rows
                .map(|(position, cells)| TableRow {
                    number: position.saturating_sub(header_position),
                    cells,
                })
                .collect(),
        }
    }

    /// Pair every row cell with the header cell above it, keeping the row
    /// number
    ///
    /// Short rows are padded with nulls; cells beyond the header are dropped.
    pub fn raw_rows(&self) -> Vec<(usize, RawRow)> {
        self.rows
            .iter()
            .map(|row| {
                let pairs = self
                    .header
                    .iter()
                    .enumerate()
                    .map(|(i, key)| (key.clone(), row.cells.get(i).cloned().unwrap_or(Value::Null)))
                    .collect();
                (row.number, pairs)
            })
            .collect()
    }

    /// Build the normalized matrix
    pub fn into_matrix(self) -> Matrix {
        let rows = self.raw_rows();
        Matrix::build_numbered(&self.header, rows)
    }
}

/// Read a file, choosing the format from its extension
pub fn read_path(path: &Path, options: &ReaderOptions) -> Result<RawTable, ReadError> {
    let kind = FileKind::from_path(path).ok_or_else(|| ReadError::WrongExtension {
        path: path.to_path_buf(),
    })?;

    log::debug!("Reading {} as {:?}", path.display(), kind);

    match kind {
        FileKind::Csv => {
            let file = std::fs::File::open(path).map_err(|source| ReadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            read_csv(file, options)
        }
        FileKind::Spreadsheet => read_spreadsheet(path),
    }
}

fn is_blank_row(row: &[Value]) -> bool {
    row.iter().all(Value::is_blank)
}
