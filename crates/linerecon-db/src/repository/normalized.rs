//! # Normalized Lines Repository
//!
//! `normalized_lines` is rebuilt from scratch on every pass. The rebuild
//! runs in one transaction so readers see either the old table or the new
//! one, never a half-filled one.

use linerecon_core::schema::{quote_ident, NORMALIZED_TABLE};
use linerecon_core::{NormalizedLine, Normalization};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{bind_row, fetch_all_rows, insert_sql, PROGRESS_EVERY};
use crate::error::DbResult;
use crate::migrations::ensure_table_schema;

/// Repository for `normalized_lines`.
#[derive(Debug, Clone)]
pub struct NormalizedRepository {
    pool: SqlitePool,
}

impl NormalizedRepository {
    /// Creates a new NormalizedRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NormalizedRepository { pool }
    }

    /// Replaces the table content with one normalization pass.
    ///
    /// Extends the table schema first; returns the number of rows written.
    pub async fn replace_all(&self, normalization: &Normalization) -> DbResult<usize> {
        ensure_table_schema(&self.pool, &normalization.schema).await?;

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(&format!("DELETE FROM {}", quote_ident(NORMALIZED_TABLE)))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for (index, line) in normalization.lines.iter().enumerate() {
            let row = line.to_row();
            let sql = insert_sql(NORMALIZED_TABLE, &row);
            bind_row(sqlx::query(&sql), &row).execute(&mut *tx).await?;

            if (index + 1) % PROGRESS_EVERY == 0 {
                debug!(written = index + 1, "Normalized lines progress");
            }
        }

        tx.commit().await?;

        info!(
            deleted,
            written = normalization.lines.len(),
            skipped = normalization.skipped.len(),
            "normalized_lines rebuilt"
        );
        Ok(normalization.lines.len())
    }

    /// Every normalized line, ordered by key.
    ///
    /// Rows with an unreadable key are skipped with a warning.
    pub async fn list(&self) -> DbResult<(Vec<String>, Vec<NormalizedLine>)> {
        let (columns, rows) = fetch_all_rows(&self.pool, NORMALIZED_TABLE, None).await?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            match NormalizedLine::from_row(row) {
                Ok(line) => lines.push(line),
                Err(e) => warn!(error = %e, "Skipping unreadable normalized line"),
            }
        }
        Ok((columns, lines))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(NORMALIZED_TABLE));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
