//! Import pipeline: file -> matrix -> typed records -> decisions -> commit

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::import::coerce::{CoercionError, coerce_cell};
use crate::import::config::{ConfigError, ImportConfiguration};
use crate::import::matrix::{ColumnName, Matrix};
use crate::import::reader::{FileKind, ReadError, ReaderOptions, WRONG_FILE_EXTENSION, read_path};
use crate::import::reconcile::{PreparedRecord, RecordAction, Reconciler, Violation};
use crate::import::schema::FieldInspector;
use crate::import::store::EntityStore;
use crate::import::types::FieldType;

/// Shown when accepted records were saved
pub const IMPORTED: &str = "Data has been imported";

/// Shown when a cell can't be converted to its field's type
pub const INVALID_DATA_TYPE: &str = "Invalid type of data. Probably missing validation.";

/// Options for a single import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Evaluate everything but save nothing
    pub dry_run: bool,
    pub reader: ReaderOptions,
}

/// Overall result of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// Records were evaluated; accepted ones were saved
    Imported,
    /// Nothing was evaluated or saved
    Aborted,
}

/// Severity of a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Success,
    Info,
    Error,
}

/// A user-facing message, optionally tied to a data row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        FlashMessage {
            level: MessageLevel::Success,
            text: text.into(),
            row: None,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        FlashMessage {
            level: MessageLevel::Info,
            text: text.into(),
            row: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        FlashMessage {
            level: MessageLevel::Error,
            text: text.into(),
            row: None,
        }
    }

    /// Attach a row number
    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

/// A record that wasn't saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    /// 1-based data row
    pub row: usize,
    pub violations: Vec<Violation>,
}

/// What an import run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub dry_run: bool,
    /// New entities (would be) created
    pub inserted: usize,
    /// Existing entities (would be) modified
    pub updated: usize,
    pub rejected: Vec<RejectedRecord>,
    /// Header columns with no matching entity field
    pub ignored_columns: Vec<String>,
    pub messages: Vec<FlashMessage>,
    /// Technical detail behind an abort, not shown as a message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ImportReport {
    fn new(dry_run: bool) -> Self {
        ImportReport {
            status: ImportStatus::Imported,
            dry_run,
            inserted: 0,
            updated: 0,
            rejected: Vec::new(),
            ignored_columns: Vec::new(),
            messages: Vec::new(),
            detail: None,
        }
    }

    fn aborted<I, S>(dry_run: bool, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ImportReport {
            status: ImportStatus::Aborted,
            messages: messages.into_iter().map(FlashMessage::error).collect(),
            ..Self::new(dry_run)
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.status == ImportStatus::Aborted
    }

    /// Number of accepted records
    pub fn accepted(&self) -> usize {
        self.inserted + self.updated
    }

    /// Error messages only
    pub fn errors(&self) -> impl Iterator<Item = &FlashMessage> {
        self.messages
            .iter()
            .filter(|m| m.level == MessageLevel::Error)
    }
}

/// How a header column maps to an entity field
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnPlan {
    column: String,
    field: String,
    field_type: FieldType,
}

/// Runs imports of one configured entity type
pub struct Importer<'a> {
    config: ImportConfiguration,
    inspector: &'a dyn FieldInspector,
    store: &'a dyn EntityStore,
    options: ImportOptions,
}

impl<'a> Importer<'a> {
    /// Create an importer, validating the configuration first
    pub fn new(
        config: &ImportConfiguration,
        inspector: &'a dyn FieldInspector,
        store: &'a dyn EntityStore,
    ) -> Result<Self, ConfigError> {
        let config = config.validated(inspector)?;
        Ok(Importer {
            config,
            inspector,
            store,
            options: ImportOptions::default(),
        })
    }

    /// Set run options
    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Validated configuration, field names canonical
    pub fn config(&self) -> &ImportConfiguration {
        &self.config
    }

    /// Import a file
    ///
    /// Unsupported or disallowed extensions and unreadable files abort the
    /// run with a message; only store failures are returned as errors.
    pub async fn import_file(&self, path: &Path) -> Result<ImportReport> {
        let allowed = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FileKind::from_extension(e).is_some() && self.config.accepts_extension(e));
        if !allowed {
            log::warn!("Rejected file with unsupported extension: {}", path.display());
            return Ok(ImportReport::aborted(self.options.dry_run, [WRONG_FILE_EXTENSION]));
        }

        let table = match read_path(path, &self.options.reader) {
            Ok(table) => table,
            Err(e @ ReadError::WrongExtension { .. }) => {
                return Ok(ImportReport::aborted(self.options.dry_run, [e.to_string()]));
            }
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                return Ok(ImportReport::aborted(
                    self.options.dry_run,
                    [format!("The file could not be read: {}", e)],
                ));
            }
        };

        log::info!("Importing {} into '{}'", path.display(), self.config.entity_type);
        self.import_matrix(&table.into_matrix()).await
    }

    /// Import an already built matrix
    pub async fn import_matrix(&self, matrix: &Matrix) -> Result<ImportReport> {
        let dry_run = self.options.dry_run;

        let violations = matrix.validate();
        if !violations.is_empty() {
            log::warn!("Matrix rejected with {} violations", violations.len());
            return Ok(ImportReport::aborted(
                dry_run,
                violations.iter().map(ToString::to_string),
            ));
        }

        let (plans, ignored_columns) = self.plan_columns(matrix);
        if !ignored_columns.is_empty() {
            log::warn!(
                "Ignoring columns not present on '{}': {}",
                self.config.entity_type,
                ignored_columns.join(", ")
            );
        }

        let shared = shared_fields(&plans);
        if !shared.is_empty() {
            log::warn!("Aborting import: {}", shared.join(" "));
            let mut report = ImportReport::aborted(dry_run, shared);
            report.ignored_columns = ignored_columns;
            return Ok(report);
        }

        let prepared = match prepare_records(matrix, &plans) {
            Ok(prepared) => prepared,
            Err(e) => {
                log::warn!("Aborting import: {}", e);
                let mut report = ImportReport::aborted(dry_run, [INVALID_DATA_TYPE]);
                report.ignored_columns = ignored_columns;
                report.detail = Some(e.to_string());
                return Ok(report);
            }
        };

        let reconciled = Reconciler::new(&self.config, self.store)
            .reconcile(prepared)
            .await?;

        let mut report = ImportReport::new(dry_run);
        report.ignored_columns = ignored_columns;

        let mut accepted = Vec::new();
        for record in reconciled {
            match record.action {
                RecordAction::Insert => {
                    report.inserted += 1;
                    accepted.push(record.entity);
                }
                RecordAction::Update => {
                    report.updated += 1;
                    accepted.push(record.entity);
                }
                RecordAction::Rejected => {
                    for violation in &record.violations {
                        report
                            .messages
                            .push(FlashMessage::error(violation.to_string()).at_row(record.row));
                    }
                    report.rejected.push(RejectedRecord {
                        row: record.row,
                        violations: record.violations,
                    });
                }
            }
        }

        if accepted.is_empty() {
            log::info!("No record accepted, nothing to save");
        } else if dry_run {
            report.messages.insert(
                0,
                FlashMessage::info(format!(
                    "Dry run: {} records would be imported",
                    accepted.len()
                )),
            );
        } else {
            let ids = self
                .store
                .save_all(&self.config.entity_type, accepted)
                .await
                .with_context(|| format!("Failed to save '{}' entities", self.config.entity_type))?;
            log::info!(
                "Saved {} '{}' entities ({} inserted, {} updated)",
                ids.len(),
                self.config.entity_type,
                report.inserted,
                report.updated
            );
            report.messages.insert(0, FlashMessage::success(IMPORTED));
        }

        Ok(report)
    }

    /// Map header columns to entity fields, returning the columns that have
    /// no field separately
    fn plan_columns(&self, matrix: &Matrix) -> (Vec<ColumnPlan>, Vec<String>) {
        let entity_type = &self.config.entity_type;
        let mut plans = Vec::new();
        let mut ignored = Vec::new();

        for (name, exists) in matrix.header_info(entity_type, self.inspector) {
            if !exists {
                ignored.push(name);
                continue;
            }
            let column = ColumnName::parse(&name);
            let field = self
                .inspector
                .resolve_field(entity_type, column.field())
                .unwrap_or_else(|| column.field().to_string());
            let field_type = self.field_type(&field, &column);
            log::debug!("Column '{}' -> field '{}' ({})", name, field, field_type);
            plans.push(ColumnPlan {
                column: name,
                field,
                field_type,
            });
        }

        (plans, ignored)
    }

    /// Schema type, then configured override, then header hint, then text
    fn field_type(&self, field: &str, column: &ColumnName) -> FieldType {
        let known = self
            .inspector
            .field_type(&self.config.entity_type, field)
            .or_else(|| self.config.fields.get(field).copied());

        let hinted = column.hint().and_then(|hint| {
            let hinted = FieldType::from_hint(hint);
            if hinted.is_none() {
                log::warn!("Unknown type hint '{}' on column '{}'", hint, field);
            }
            hinted
        });

        match (known, hinted) {
            (Some(known), Some(hinted)) => {
                if known != hinted {
                    log::warn!(
                        "Ignoring type hint {} on '{}', field is {}",
                        hinted,
                        field,
                        known
                    );
                }
                known
            }
            (Some(known), None) => known,
            (None, Some(hinted)) => hinted,
            (None, None) => FieldType::String,
        }
    }
}

/// One message per field that more than one column maps onto, e.g. a column
/// and its alias
fn shared_fields(plans: &[ColumnPlan]) -> Vec<String> {
    let mut by_field: Vec<(&str, Vec<&str>)> = Vec::new();
    for plan in plans {
        match by_field.iter_mut().find(|(field, _)| *field == plan.field) {
            Some((_, columns)) => columns.push(&plan.column),
            None => by_field.push((&plan.field, vec![&plan.column])),
        }
    }

    by_field
        .into_iter()
        .filter(|(_, columns)| columns.len() > 1)
        .map(|(field, columns)| {
            let columns: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
            format!(
                "Columns {} map to the same field \"{}\".",
                columns.join(", "),
                field
            )
        })
        .collect()
}

/// Coerce every record; the first failing cell fails the whole batch
fn prepare_records(matrix: &Matrix, plans: &[ColumnPlan]) -> Result<Vec<PreparedRecord>, CoercionError> {
    matrix
        .records()
        .iter()
        .map(|record| {
            let mut values = HashMap::new();
            for plan in plans {
                if let Some(value) = record.get(&plan.column) {
                    let value = coerce_cell(value, plan.field_type, record.row(), &plan.column)?;
                    values.insert(plan.field.clone(), value);
                }
            }
            Ok(PreparedRecord::new(
                record.row(),
                record.discriminator().cloned(),
                values,
            ))
        })
        .collect()
}
