//! Insert / update / reject decisions for a batch of records
//!
//! Every record starts pending. A discriminator that resolves to a stored
//! entity makes it an update, no discriminator makes it an insert. Rules are
//! then evaluated in configuration order over the whole batch, and any
//! violation rejects the record. The batch is never short-circuited: all
//! violations of all records are collected.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;

use crate::import::config::{ImportConfiguration, Rule};
use crate::import::store::EntityStore;
use crate::import::types::{Entity, EntityId, Value};

/// A record after type coercion, fields already mapped to entity fields
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    /// 1-based data row
    pub row: usize,
    /// Raw value of the `entity` column, if present and not blank
    pub discriminator: Option<Value>,
    /// Entity field -> typed value
    pub values: HashMap<String, Value>,
}

impl PreparedRecord {
    pub fn new(row: usize, discriminator: Option<Value>, values: HashMap<String, Value>) -> Self {
        PreparedRecord {
            row,
            discriminator,
            values,
        }
    }
}

/// Action decided for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    /// Create a new entity
    Insert,
    /// Modify an existing entity
    Update,
    /// Not persisted, see violations
    Rejected,
}

impl std::fmt::Display for RecordAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordAction::Insert => write!(f, "insert"),
            RecordAction::Update => write!(f, "update"),
            RecordAction::Rejected => write!(f, "rejected"),
        }
    }
}

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The discriminator doesn't identify a stored entity
    UnknownEntity { discriminator: String },
    /// Another entity (stored or in the batch) has the same values
    Duplicate { fields: Vec<String> },
    /// Required fields are null or blank
    Blank { fields: Vec<String> },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::UnknownEntity { discriminator } => {
                write!(f, "Entity \"{}\" does not exist.", discriminator)
            }
            Violation::Duplicate { fields } => write!(
                f,
                "Such entity already exists for the same values of fields: {}.",
                fields.join(", ")
            ),
            Violation::Blank { fields } => {
                write!(f, "This value should not be blank: {}.", fields.join(", "))
            }
        }
    }
}

/// Outcome for a single record
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    /// 1-based data row
    pub row: usize,
    pub action: RecordAction,
    /// Entity as it would be saved (id set for updates)
    pub entity: Entity,
    pub violations: Vec<Violation>,
}

impl ReconciledRecord {
    /// A record that creates a new entity
    pub fn insert(row: usize, entity: Entity) -> Self {
        ReconciledRecord {
            row,
            action: RecordAction::Insert,
            entity,
            violations: Vec::new(),
        }
    }

    /// A record that updates an existing entity
    pub fn update(row: usize, entity: Entity) -> Self {
        ReconciledRecord {
            row,
            action: RecordAction::Update,
            entity,
            violations: Vec::new(),
        }
    }

    /// A record rejected up front
    pub fn rejected(row: usize, entity: Entity, violation: Violation) -> Self {
        ReconciledRecord {
            row,
            action: RecordAction::Rejected,
            entity,
            violations: vec![violation],
        }
    }

    /// Add a violation, rejecting the record
    pub fn reject(&mut self, violation: Violation) {
        self.action = RecordAction::Rejected;
        self.violations.push(violation);
    }

    pub fn is_insert(&self) -> bool {
        self.action == RecordAction::Insert
    }

    pub fn is_update(&self) -> bool {
        self.action == RecordAction::Update
    }

    pub fn is_rejected(&self) -> bool {
        self.action == RecordAction::Rejected
    }

    /// Whether the record's target could be determined
    fn is_resolved(&self) -> bool {
        !self
            .violations
            .iter()
            .any(|v| matches!(v, Violation::UnknownEntity { .. }))
    }
}

/// Evaluates configured rules against a batch using the store
pub struct Reconciler<'a> {
    config: &'a ImportConfiguration,
    store: &'a dyn EntityStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a ImportConfiguration, store: &'a dyn EntityStore) -> Self {
        Reconciler { config, store }
    }

    /// Decide an action for every record, in input order
    pub async fn reconcile(&self, records: Vec<PreparedRecord>) -> Result<Vec<ReconciledRecord>> {
        let mut reconciled = Vec::with_capacity(records.len());
        for record in records {
            reconciled.push(self.resolve_target(record).await?);
        }

        for rule in &self.config.rules {
            match rule {
                Rule::Unique { fields } => self.check_unique(fields, &mut reconciled).await?,
                Rule::NotBlank { fields } => check_not_blank(fields, &mut reconciled),
            }
        }

        let rejected = reconciled.iter().filter(|r| r.is_rejected()).count();
        log::info!(
            "Reconciled {} records for '{}': {} rejected",
            reconciled.len(),
            self.config.entity_type,
            rejected
        );

        Ok(reconciled)
    }

    /// Turn a prepared record into a pending insert or update
    async fn resolve_target(&self, record: PreparedRecord) -> Result<ReconciledRecord> {
        let Some(discriminator) = record.discriminator else {
            return Ok(ReconciledRecord::insert(record.row, Entity::new(record.values)));
        };

        let existing = match parse_entity_id(&discriminator) {
            Some(id) => self.store.find(&self.config.entity_type, id).await?,
            None => None,
        };

        match existing {
            Some(mut entity) => {
                log::debug!(
                    "Row {} updates {} {}",
                    record.row,
                    self.config.entity_type,
                    discriminator
                );
                entity.merge(&record.values);
                Ok(ReconciledRecord::update(record.row, entity))
            }
            None => {
                log::warn!(
                    "Row {} references missing {} '{}'",
                    record.row,
                    self.config.entity_type,
                    discriminator
                );
                Ok(ReconciledRecord::rejected(
                    record.row,
                    Entity::new(record.values),
                    Violation::UnknownEntity {
                        discriminator: discriminator.to_string(),
                    },
                ))
            }
        }
    }

    /// Reject records whose field tuple collides with a stored entity or with
    /// another record of the batch
    async fn check_unique(&self, fields: &[String], records: &mut [ReconciledRecord]) -> Result<()> {
        let tuples: Vec<Option<Vec<(String, Value)>>> = records
            .iter()
            .map(|record| {
                if record.is_resolved() {
                    unique_tuple(&record.entity, fields)
                } else {
                    None
                }
            })
            .collect();
        let target_ids: Vec<Option<EntityId>> = records.iter().map(|r| r.entity.id).collect();

        for (i, (record, tuple)) in records.iter_mut().zip(&tuples).enumerate() {
            let Some(tuple) = tuple else {
                continue;
            };

            // Rows updating the same stored entity share its values
            let target = record.entity.id;
            let in_batch = tuples.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.as_ref() == Some(tuple)
                    && (target.is_none() || target_ids[j] != target)
            });
            let duplicate = in_batch
                || self
                    .store
                    .exists_with(&self.config.entity_type, tuple, record.entity.id)
                    .await?;

            if duplicate {
                log::debug!(
                    "Row {} duplicates [{}] (in batch: {})",
                    record.row,
                    fields.join(", "),
                    in_batch
                );
                record.reject(Violation::Duplicate {
                    fields: fields.to_vec(),
                });
            }
        }

        Ok(())
    }
}

fn check_not_blank(fields: &[String], records: &mut [ReconciledRecord]) {
    for record in records.iter_mut().filter(|r| r.is_resolved()) {
        let blank: Vec<String> = fields
            .iter()
            .filter(|f| record.entity.get_field(f).is_none_or(Value::is_blank))
            .cloned()
            .collect();
        if !blank.is_empty() {
            record.reject(Violation::Blank { fields: blank });
        }
    }
}

/// Values of the rule's fields, or None when any of them is blank
///
/// Blank values never collide, like NULLs in a unique index.
fn unique_tuple(entity: &Entity, fields: &[String]) -> Option<Vec<(String, Value)>> {
    fields
        .iter()
        .map(|field| {
            let value = entity.get_field(field).filter(|v| !v.is_blank())?;
            Some((field.clone(), value.clone()))
        })
        .collect()
}

/// Interpret a discriminator as an entity id
pub fn parse_entity_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as EntityId),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
