//! SQLite-backed entity store
//!
//! One table per declared entity schema: an `id INTEGER PRIMARY KEY` column
//! plus one typed column per field. Tables are created on connect.

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use super::EntityStore;
use crate::import::schema::{EntitySchema, FieldSchema, SchemaRegistry};
use crate::import::types::{Entity, EntityId, FieldType, Value};

/// Entity store backed by a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    schemas: SchemaRegistry,
}

impl SqliteStore {
    /// Open (or create) the database and make sure every entity table exists
    pub async fn connect(database_url: &str, schemas: SchemaRegistry) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);

        // A single connection keeps `sqlite::memory:` databases shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", database_url))?;

        let store = SqliteStore { pool, schemas };
        store.ensure_tables().await?;
        Ok(store)
    }

    /// Create missing tables for all declared entity schemas
    pub async fn ensure_tables(&self) -> Result<()> {
        for schema in &self.schemas.entities {
            let mut columns = vec![format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                quote_ident("id")
            )];
            for field in &schema.fields {
                columns.push(format!("{} {}", quote_ident(&field.name), sql_type(field.storage_type())));
            }

            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                quote_ident(&schema.name),
                columns.join(", ")
            );
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create table for {}", schema.name))?;

            log::debug!("Ensured table for entity type '{}'", schema.name);
        }
        Ok(())
    }

    /// Number of stored entities of a type
    pub async fn count(&self, entity_type: &str) -> Result<usize> {
        let schema = self.schema(entity_type)?;
        let sql = format!("SELECT COUNT(*) AS n FROM {}", quote_ident(&schema.name));
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count entities")?;
        Ok(row.try_get::<i64, _>("n")? as usize)
    }

    fn schema(&self, entity_type: &str) -> Result<&EntitySchema> {
        self.schemas
            .find_entity(entity_type)
            .with_context(|| format!("No schema declared for entity type '{}'", entity_type))
    }

    fn field<'s>(schema: &'s EntitySchema, name: &str) -> Result<&'s FieldSchema> {
        schema
            .fields
            .iter()
            .find(|f| f.name == name)
            .with_context(|| format!("Entity type '{}' has no field '{}'", schema.name, name))
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn find(&self, entity_type: &str, id: EntityId) -> Result<Option<Entity>> {
        let schema = self.schema(entity_type)?;
        let mut columns = vec![quote_ident("id")];
        columns.extend(schema.fields.iter().map(|f| quote_ident(&f.name)));

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            columns.join(", "),
            quote_ident(&schema.name),
            quote_ident("id")
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load {} {}", entity_type, id))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut entity = Entity::with_id(row.try_get("id")?, Default::default());
        for field in &schema.fields {
            entity.set_field(field.name.clone(), read_value(&row, field)?);
        }
        Ok(Some(entity))
    }

    async fn exists_with(
        &self,
        entity_type: &str,
        values: &[(String, Value)],
        exclude: Option<EntityId>,
    ) -> Result<bool> {
        let schema = self.schema(entity_type)?;

        let mut conditions = Vec::with_capacity(values.len() + 1);
        for (field, _) in values {
            let field = Self::field(schema, field)?;
            // IS compares NULLs as equal, like the in-memory store
            conditions.push(format!("{} IS ?", quote_ident(&field.name)));
        }
        if exclude.is_some() {
            conditions.push(format!("{} != ?", quote_ident("id")));
        }
        if conditions.is_empty() {
            conditions.push("1 = 1".to_string());
        }

        let sql = format!(
            "SELECT 1 FROM {} WHERE {} LIMIT 1",
            quote_ident(&schema.name),
            conditions.join(" AND ")
        );
        let mut query = sqlx::query(&sql);
        for (_, value) in values {
            query = bind_value(query, value);
        }
        if let Some(id) = exclude {
            query = query.bind(id);
        }

        let found = query
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to check duplicates for {}", entity_type))?;
        Ok(found.is_some())
    }

    async fn save_all(&self, entity_type: &str, entities: Vec<Entity>) -> Result<Vec<EntityId>> {
        let schema = self.schema(entity_type)?;
        let table = quote_ident(&schema.name);

        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;
        let mut ids = Vec::with_capacity(entities.len());

        for entity in &entities {
            let mut fields: Vec<(&String, &Value)> = entity.fields.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            for (name, _) in &fields {
                Self::field(schema, name)?;
            }

            match entity.id {
                Some(id) => {
                    if fields.is_empty() {
                        ids.push(id);
                        continue;
                    }
                    let assignments: Vec<String> = fields
                        .iter()
                        .map(|(name, _)| format!("{} = ?", quote_ident(name)))
                        .collect();
                    let sql = format!(
                        "UPDATE {} SET {} WHERE {} = ?",
                        table,
                        assignments.join(", "),
                        quote_ident("id")
                    );
                    let mut query = sqlx::query(&sql);
                    for (_, value) in &fields {
                        query = bind_value(query, value);
                    }
                    let result = query
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to update {} {}", entity_type, id))?;
                    if result.rows_affected() != 1 {
                        bail!("Cannot update {} {}: entity does not exist", entity_type, id);
                    }
                    ids.push(id);
                }
                None => {
                    let sql = if fields.is_empty() {
                        format!("INSERT INTO {} DEFAULT VALUES", table)
                    } else {
                        let columns: Vec<String> =
                            fields.iter().map(|(name, _)| quote_ident(name)).collect();
                        let placeholders = vec!["?"; fields.len()].join(", ");
                        format!(
                            "INSERT INTO {} ({}) VALUES ({})",
                            table,
                            columns.join(", "),
                            placeholders
                        )
                    };
                    let mut query = sqlx::query(&sql);
                    for (_, value) in &fields {
                        query = bind_value(query, value);
                    }
                    let result = query
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to insert {}", entity_type))?;
                    ids.push(result.last_insert_rowid());
                }
            }
        }

        tx.commit().await.context("Failed to commit import")?;
        log::info!("Saved {} {} entities", ids.len(), entity_type);
        Ok(ids)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "TEXT",
        FieldType::Integer => "INTEGER",
        FieldType::Decimal => "REAL",
        FieldType::Boolean => "INTEGER",
        FieldType::DateTime => "TEXT",
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::String(s) => query.bind(s.clone()),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Bool(b) => query.bind(*b),
        Value::DateTime(dt) => query.bind(*dt),
    }
}

fn read_value(row: &SqliteRow, field: &FieldSchema) -> Result<Value> {
    let name = field.name.as_str();
    let value = match field.storage_type() {
        FieldType::String => row.try_get::<Option<String>, _>(name)?.map(Value::String),
        FieldType::Integer => row.try_get::<Option<i64>, _>(name)?.map(Value::Int),
        FieldType::Decimal => row.try_get::<Option<f64>, _>(name)?.map(Value::Float),
        FieldType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        FieldType::DateTime => row
            .try_get::<Option<DateTime<Utc>>, _>(name)?
            .map(Value::DateTime),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn schemas() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.add_entity(
            EntitySchema::new("contact")
                .with_field(FieldSchema::new("email", FieldType::String))
                .with_field(FieldSchema::new("age", FieldType::Integer))
                .with_field(FieldSchema::new("active", FieldType::Boolean)),
        );
        registry
    }

    fn fields(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", schemas()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_find_update() {
        let store = store().await;
        let id = store
            .save(
                "contact",
                Entity::new(fields(&[
                    ("email", Value::from("a@b.c")),
                    ("age", Value::Int(30)),
                    ("active", Value::Bool(true)),
                ])),
            )
            .await
            .unwrap();

        let found = store.find("contact", id).await.unwrap().unwrap();
        assert_eq!(found.get_field("email"), Some(&Value::from("a@b.c")));
        assert_eq!(found.get_field("age"), Some(&Value::Int(30)));
        assert_eq!(found.get_field("active"), Some(&Value::Bool(true)));

        store
            .save("contact", Entity::with_id(id, fields(&[("age", Value::Int(31))])))
            .await
            .unwrap();
        let found = store.find("contact", id).await.unwrap().unwrap();
        assert_eq!(found.get_field("age"), Some(&Value::Int(31)));
        assert_eq!(found.get_field("email"), Some(&Value::from("a@b.c")));
        assert!(store.find("contact", id + 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_with() {
        let store = store().await;
        let id = store
            .save(
                "contact",
                Entity::new(fields(&[("email", Value::from("a@b.c")), ("age", Value::Null)])),
            )
            .await
            .unwrap();

        let tuple = vec![("email".to_string(), Value::from("a@b.c"))];
        assert!(store.exists_with("contact", &tuple, None).await.unwrap());
        assert!(!store.exists_with("contact", &tuple, Some(id)).await.unwrap());

        let tuple = vec![("email".to_string(), Value::from("x@y.z"))];
        assert!(!store.exists_with("contact", &tuple, None).await.unwrap());

        let tuple = vec![("phone".to_string(), Value::from("1"))];
        assert!(store.exists_with("contact", &tuple, None).await.is_err());
    }

    #[tokio::test]
    async fn test_save_all_rolls_back_on_missing_update_target() {
        let store = store().await;
        let result = store
            .save_all(
                "contact",
                vec![
                    Entity::new(fields(&[("email", Value::from("a@b.c"))])),
                    Entity::with_id(42, fields(&[("email", Value::from("x@y.z"))])),
                ],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(store.count("contact").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_entity_type() {
        let store = store().await;
        assert!(store.find("invoice", 1).await.is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
