//! # Source Repository
//!
//! Snapshots of the three source tables the ingestion collaborators fill.
//!
//! A snapshot is read in one query and handed to the core as an immutable
//! [`SourceTable`]; the pipeline never reads a source table twice within a
//! stage.

use linerecon_core::schema::{quote_ident, ColumnDef};
use linerecon_core::validation::validate_column_name;
use linerecon_core::{Row, Source, SourceTable};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{bind_row, fetch_all_rows, insert_sql};
use crate::error::{DbError, DbResult};
use crate::migrations::table_columns;

/// Repository for the `*_open_lines` source tables.
#[derive(Debug, Clone)]
pub struct SourceRepository {
    pool: SqlitePool,
}

impl SourceRepository {
    /// Creates a new SourceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SourceRepository { pool }
    }

    /// Reads a full snapshot of one source table.
    ///
    /// ## Errors
    /// `SourceUnavailable` when the table does not exist or has no rows.
    pub async fn snapshot(&self, source: Source) -> DbResult<SourceTable> {
        let table = source.table();
        let (columns, rows) = fetch_all_rows(&self.pool, table, None).await?;

        if columns.is_empty() {
            return Err(DbError::source_unavailable(table, "table does not exist"));
        }
        if rows.is_empty() {
            return Err(DbError::source_unavailable(table, "table is empty"));
        }

        debug!(table, rows = rows.len(), columns = columns.len(), "Source snapshot read");
        Ok(SourceTable::new(source, columns, rows))
    }

    /// Number of rows in one source table (0 when it does not exist).
    pub async fn count(&self, source: Source) -> DbResult<i64> {
        if table_columns(&self.pool, source.table()).await?.is_empty() {
            return Ok(0);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(source.table()));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Appends rows to a source table, adding any column it lacks as TEXT.
    ///
    /// Stands in for the ingestion collaborators in the seed binary and in
    /// tests.
    pub async fn append(&self, source: Source, rows: &[Row]) -> DbResult<usize> {
        let table = source.table();
        let existing = table_columns(&self.pool, table).await?;

        let mut wanted: Vec<&str> = Vec::new();
        for row in rows {
            for column in row.columns() {
                if !existing.iter().any(|c| c == column) && !wanted.contains(&column) {
                    wanted.push(column);
                }
            }
        }
        for column in wanted {
            validate_column_name(column).map_err(linerecon_core::CoreError::from)?;
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(table),
                ColumnDef::text(column).ddl()
            );
            sqlx::query(&sql).execute(&self.pool).await?;
            debug!(table, column, "Added source column");
        }

        for row in rows {
            let sql = insert_sql(table, row);
            bind_row(sqlx::query(&sql), row).execute(&self.pool).await?;
        }

        info!(table, rows = rows.len(), "Source rows appended");
        Ok(rows.len())
    }

    /// Removes every row of one source table.
    pub async fn clear(&self, source: Source) -> DbResult<u64> {
        let sql = format!("DELETE FROM {}", quote_ident(source.table()));
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
