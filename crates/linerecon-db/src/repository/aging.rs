//! # Aging Repository
//!
//! Reads the `aging_entries` ledger and applies an [`AgingPlan`] to it.
//!
//! The ledger table is only ever extended. A sync that finds nothing
//! changed writes no ledger rows, which is what keeps `last_update`
//! meaningful.

use std::collections::BTreeMap;

use linerecon_core::schema::{col, quote_ident, AGING_TABLE};
use linerecon_core::{AgingEntry, AgingPlan, AgingSummary, LineKey};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{bind_key, bind_row, fetch_all_rows, insert_sql, key_predicate, PROGRESS_EVERY};
use crate::error::DbResult;
use crate::migrations::ensure_table_schema;

/// Repository for `aging_entries`.
#[derive(Debug, Clone)]
pub struct AgingRepository {
    pool: SqlitePool,
}

impl AgingRepository {
    /// Creates a new AgingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AgingRepository { pool }
    }

    /// Every ledger entry, ordered by key.
    ///
    /// Rows with an unreadable key are skipped with a warning. A row without
    /// `last_update` is read with an empty one, which the next sync restamps.
    pub async fn list(&self) -> DbResult<Vec<AgingEntry>> {
        let (_, rows) = fetch_all_rows(&self.pool, AGING_TABLE, None).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            match AgingEntry::from_row(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Skipping unreadable aging entry"),
            }
        }
        Ok(entries)
    }

    /// The ledger keyed by line key, as the aging planner wants it.
    pub async fn ledger(&self) -> DbResult<BTreeMap<LineKey, AgingEntry>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|entry| (entry.key.clone(), entry))
            .collect())
    }

    /// Applies an aging plan: schema extension, inserts, updates, deletes.
    ///
    /// The schema step runs on every sync, so a snapshot column that is
    /// NULL on every missing-ERP line still lands in the ledger.
    pub async fn apply(&self, plan: &AgingPlan) -> DbResult<AgingSummary> {
        ensure_table_schema(&self.pool, &plan.schema).await?;

        if plan.is_noop() {
            debug!(unchanged = plan.summary.unchanged, "Aging ledger already current");
            return Ok(plan.summary.clone());
        }

        for (index, entry) in plan.inserts.iter().enumerate() {
            let row = entry.to_row();
            let sql = insert_sql(AGING_TABLE, &row);
            bind_row(sqlx::query(&sql), &row).execute(&self.pool).await?;

            if (index + 1) % PROGRESS_EVERY == 0 {
                debug!(inserted = index + 1, total = plan.inserts.len(), "Aging insert progress");
            }
        }

        for update in &plan.updates {
            let row = update.entry.to_row();
            let assignments = row
                .columns()
                .map(|c| format!("{} = ?", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_ident(AGING_TABLE),
                assignments,
                key_predicate()
            );
            let query = bind_row(sqlx::query(&sql), &row);
            bind_key(query, &update.entry.key)
                .execute(&self.pool)
                .await?;
            debug!(key = %update.entry.key, changed = ?update.changed, "Aging entry refreshed");
        }

        let delete_sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(AGING_TABLE),
            key_predicate()
        );
        for key in &plan.deletes {
            bind_key(sqlx::query(&delete_sql), key)
                .execute(&self.pool)
                .await?;
            debug!(key = %key, "Aging entry resolved");
        }

        info!(
            missing_erp = plan.summary.missing_erp,
            inserted = plan.summary.inserted,
            updated = plan.summary.updated,
            unchanged = plan.summary.unchanged,
            deleted = plan.summary.deleted,
            "aging_entries synced"
        );
        Ok(plan.summary.clone())
    }

    /// `last_update` of one entry.
    pub async fn last_update(&self, key: &LineKey) -> DbResult<Option<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            quote_ident(col::LAST_UPDATE),
            quote_ident(AGING_TABLE),
            key_predicate()
        );
        let value: Option<Option<String>> = bind_key(sqlx::query(&sql), key)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| sqlx::Row::try_get(&row, 0usize))
            .transpose()?;
        Ok(value.flatten())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(AGING_TABLE));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
