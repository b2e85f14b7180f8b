//! # Database Migrations
//!
//! Embedded SQL migrations plus the additive schema step that runs before
//! every sync.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Database::new                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MIGRATOR.run  ← 001_initial_schema.sql (base tables, once)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ... each stage, before writing ...                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ensure_table_schema(TableSchema)                                      │
//! │       │                                                                 │
//! │       ├── table missing?       CREATE TABLE from the declared schema   │
//! │       ├── column missing?      ALTER TABLE .. ADD COLUMN               │
//! │       ├── extra live column?   left alone                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  schema_registry ← (table, version, column_count, migrated_at)         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql` (e.g., `002_add_status_index.sql`)
//! 3. Write idempotent SQL (use `IF NOT EXISTS` where possible)
//! 4. **NEVER** modify existing migrations - always add new ones
//! 5. Bump the matching `*_SCHEMA_VERSION` in `linerecon_core::schema`

use chrono::Utc;
use linerecon_core::schema::{quote_ident, TableSchema};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Embedded migrations from the `migrations/sqlite` directory.
///
/// ## How This Works
/// The `sqlx::migrate!()` macro embeds all SQL files from the specified
/// directory into the binary at compile time. No runtime file access needed.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// ## Safety
/// - Idempotent: safe to run multiple times
/// - Transactional: each migration runs in a transaction
/// - Ordered: migrations run in filename order (001, 002, ...)
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns (total_migrations, applied_migrations).
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}

// =============================================================================
// Additive Schema Migration
// =============================================================================

/// What [`ensure_table_schema`] did to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    pub table: String,
    pub created: bool,
    pub added: Vec<String>,
    pub column_count: usize,
}

/// Live column names of `table`, in table order. Empty if it does not exist.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> DbResult<Vec<String>> {
    let columns: Vec<String> =
        sqlx::query_scalar("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(pool)
            .await?;
    Ok(columns)
}

/// Brings a recon table up to its declared schema without losing data.
///
/// Creates the table if it is missing, adds every declared column the live
/// table lacks, and records the result in `schema_registry`. Existing
/// columns are never dropped or altered.
///
/// ## Errors
/// - `Core` when the declared schema has an invalid identifier
/// - `MigrationFailed` when the store was migrated by a newer schema version
pub async fn ensure_table_schema(pool: &SqlitePool, schema: &TableSchema) -> DbResult<SchemaChange> {
    schema.validate()?;

    let recorded: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_registry WHERE table_name = ?1")
            .bind(&schema.name)
            .fetch_optional(pool)
            .await?;
    if let Some(recorded) = recorded {
        if recorded > i64::from(schema.version) {
            return Err(DbError::MigrationFailed(format!(
                "{} is at schema version {}, this build knows version {}",
                schema.name, recorded, schema.version
            )));
        }
    }

    let mut existing = table_columns(pool, &schema.name).await?;
    let created = existing.is_empty();
    if created {
        info!(table = %schema.name, "Creating table from declared schema");
        sqlx::query(&schema.create_sql()).execute(pool).await?;
        existing = table_columns(pool, &schema.name).await?;
    }

    let mut added = Vec::new();
    for column in schema.missing_from(&existing) {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_ident(&schema.name),
            column.ddl()
        );
        sqlx::query(&sql).execute(pool).await?;
        info!(table = %schema.name, column = %column.name, "Added column");
        added.push(column.name.clone());
    }

    let column_count = existing.len() + added.len();

    sqlx::query(
        r#"
        INSERT INTO schema_registry (table_name, version, column_count, migrated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(table_name) DO UPDATE SET
            version = excluded.version,
            column_count = excluded.column_count,
            migrated_at = excluded.migrated_at
        "#,
    )
    .bind(&schema.name)
    .bind(i64::from(schema.version))
    .bind(column_count as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    debug!(
        table = %schema.name,
        version = schema.version,
        column_count,
        added = added.len(),
        "Schema ensured"
    );

    Ok(SchemaChange {
        table: schema.name.clone(),
        created,
        added,
        column_count,
    })
}
