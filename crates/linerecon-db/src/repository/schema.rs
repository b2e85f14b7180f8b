//! # Schema Registry Repository
//!
//! Read side of `schema_registry`. Rows are written by
//! [`crate::migrations::ensure_table_schema`].

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::DbResult;

/// One row of `schema_registry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SchemaRecord {
    pub table_name: String,
    pub version: i64,
    pub column_count: i64,
    pub migrated_at: String,
}

/// Repository for `schema_registry`.
#[derive(Debug, Clone)]
pub struct SchemaRegistryRepository {
    pool: SqlitePool,
}

impl SchemaRegistryRepository {
    /// Creates a new SchemaRegistryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SchemaRegistryRepository { pool }
    }

    /// Registry entry of one table, if it was ever migrated.
    pub async fn get(&self, table: &str) -> DbResult<Option<SchemaRecord>> {
        let record = sqlx::query_as::<_, SchemaRecord>(
            r#"
            SELECT table_name, version, column_count, migrated_at
            FROM schema_registry
            WHERE table_name = ?1
            "#,
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Every registry entry, by table name.
    pub async fn list(&self) -> DbResult<Vec<SchemaRecord>> {
        let records = sqlx::query_as::<_, SchemaRecord>(
            r#"
            SELECT table_name, version, column_count, migrated_at
            FROM schema_registry
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
