//! Batch import of entities from tabular files
//!
//! A file is read into a [`RawTable`], normalized into a [`Matrix`], its cells
//! coerced to field types, and every record reconciled into an insert, an
//! update or a rejection before accepted records are saved in one go.

pub mod coerce;
pub mod config;
pub mod importer;
pub mod matrix;
pub mod reader;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod types;

pub use config::{ConfigError, ImportConfiguration, Rule};
pub use importer::{FlashMessage, ImportOptions, ImportReport, ImportStatus, Importer, MessageLevel};
pub use matrix::{Matrix, MatrixViolation, Record};
pub use reader::{RawTable, ReaderOptions};
pub use reconcile::{RecordAction, Violation};
pub use schema::{EntitySchema, FieldInspector, FieldSchema, SchemaRegistry};
pub use store::{EntityStore, MemoryStore, SqliteStore};
pub use types::{Entity, EntityId, FieldType, Value};
