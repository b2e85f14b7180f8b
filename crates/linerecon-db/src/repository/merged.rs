//! # Merged Records Repository
//!
//! Applies a [`MergePlan`] to `merged_records` and serves the table to the
//! classifier, the aging ledger and the reporting side.
//!
//! ## Upsert
//! ```text
//! INSERT INTO merged_records (every declared column)
//! VALUES (...)
//! ON CONFLICT (line key) DO UPDATE SET
//!     every column = excluded.column      -- except the key
//!                                         -- and created_at
//! ```
//! `created_at` is left out of the update list, so a known key keeps the
//! value it was first inserted with even if a plan carried another one.

use std::collections::BTreeMap;

use linerecon_core::schema::{col, quote_ident, MERGED_TABLE, KEY_COLUMNS};
use linerecon_core::{LineKey, MergePlan, MergeSummary, Row, TableSchema};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{
    bind_key, decode_row, fetch_all_rows, key_list, key_predicate, select_sql, PROGRESS_EVERY,
};
use crate::error::DbResult;
use crate::migrations::{ensure_table_schema, table_columns};

/// Repository for `merged_records`.
#[derive(Debug, Clone)]
pub struct MergedRepository {
    pool: SqlitePool,
}

/// `INSERT .. ON CONFLICT DO UPDATE` over every column of `schema`.
fn upsert_sql(schema: &TableSchema) -> String {
    let columns: Vec<&str> = schema.column_names().collect();
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates = columns
        .iter()
        .filter(|c| !KEY_COLUMNS.contains(*c) && **c != col::CREATED_AT)
        .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
        quote_ident(&schema.name),
        names,
        placeholders,
        key_list(),
        updates
    )
}

impl MergedRepository {
    /// Creates a new MergedRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MergedRepository { pool }
    }

    /// `created_at` of every stored key.
    ///
    /// Rows with an unreadable key are skipped with a warning.
    pub async fn created_at_index(&self) -> DbResult<BTreeMap<LineKey, String>> {
        let columns: Vec<String> = KEY_COLUMNS
            .iter()
            .chain(std::iter::once(&col::CREATED_AT))
            .map(|c| c.to_string())
            .collect();
        let rows = sqlx::query(&select_sql(MERGED_TABLE, &columns))
            .fetch_all(&self.pool)
            .await?;

        let mut index = BTreeMap::new();
        for raw in &rows {
            let row = decode_row(raw, &columns)?;
            match LineKey::from_row(&row) {
                Ok(key) => {
                    index.insert(key, row.get(col::CREATED_AT).unwrap_or_default().to_string());
                }
                Err(e) => warn!(error = %e, "Skipping merged record with an unreadable key"),
            }
        }
        Ok(index)
    }

    /// Applies a merge plan: schema extension, upserts, then deletes.
    ///
    /// Each statement commits on its own; every one is idempotent per key,
    /// so a pass interrupted half-way is completed by the next one.
    pub async fn apply(&self, plan: &MergePlan) -> DbResult<MergeSummary> {
        let change = ensure_table_schema(&self.pool, &plan.schema).await?;
        if !change.added.is_empty() {
            info!(columns = ?change.added, "merged_records schema extended");
        }

        let sql = upsert_sql(&plan.schema);
        for (index, record) in plan.upserts.iter().enumerate() {
            let row = record.to_row(&plan.schema);
            let mut query = sqlx::query(&sql);
            for column in plan.schema.column_names() {
                query = query.bind(row.get(column).map(str::to_string));
            }
            query.execute(&self.pool).await?;

            if (index + 1) % PROGRESS_EVERY == 0 {
                debug!(upserted = index + 1, total = plan.upserts.len(), "Merge progress");
            }
        }

        let delete_sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(MERGED_TABLE),
            key_predicate()
        );
        for key in &plan.deletes {
            bind_key(sqlx::query(&delete_sql), key)
                .execute(&self.pool)
                .await?;
            debug!(key = %key, "Deleted vanished merged record");
        }

        info!(
            total = plan.summary.total,
            inserted = plan.summary.inserted,
            updated = plan.summary.updated,
            deleted = plan.summary.deleted,
            matched_all = plan.summary.matched_all,
            "merged_records synced"
        );
        Ok(plan.summary.clone())
    }

    /// Every merged row with every live column, ordered by key.
    pub async fn list(&self) -> DbResult<Vec<Row>> {
        let (_, rows) = fetch_all_rows(&self.pool, MERGED_TABLE, None).await?;
        Ok(rows)
    }

    /// Merged rows without an ERP match.
    pub async fn missing_erp(&self) -> DbResult<Vec<Row>> {
        let filter = format!("{} = 0", quote_ident(col::MATCH_ERP));
        let (_, rows) = fetch_all_rows(&self.pool, MERGED_TABLE, Some(&filter)).await?;
        Ok(rows)
    }

    /// One merged row by key.
    pub async fn get(&self, key: &LineKey) -> DbResult<Option<Row>> {
        let columns = table_columns(&self.pool, MERGED_TABLE).await?;
        let sql = format!("{} WHERE {}", select_sql(MERGED_TABLE, &columns), key_predicate());
        let row = bind_key(sqlx::query(&sql), key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_row(&r, &columns)).transpose()
    }

    pub async fn count(&self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(MERGED_TABLE));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
