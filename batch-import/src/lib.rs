//! Bulk creation and update of entities from CSV and spreadsheet files

pub mod config;
pub mod import;
