//! # Repository Module
//!
//! Store access for the source tables and the three recon tables.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Reads And Writes What                            │
//! │                                                                         │
//! │  SourceRepository         *_open_lines     snapshot (read)             │
//! │  NormalizedRepository     normalized_lines replace_all / list          │
//! │  MergedRepository         merged_records   apply(MergePlan) / list     │
//! │  AgingRepository          aging_entries    apply(AgingPlan) / ledger   │
//! │  SchemaRegistryRepository schema_registry  get / list                  │
//! │                                                                         │
//! │  Stages never touch SQL. They get snapshots from here, hand them to    │
//! │  linerecon-core, and give the resulting plan back to be applied.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dynamic Columns
//! Recon tables carry whatever columns the sources report, so queries are
//! built at runtime from `PRAGMA table_info` instead of `query!` macros.
//! Every value is read as `CAST(.. AS TEXT)`: the store compares and copies
//! text, and a match flag reads back as `"0"`/`"1"`.

pub mod aging;
pub mod merged;
pub mod normalized;
pub mod schema;
pub mod source;

use linerecon_core::schema::{quote_ident, KEY_COLUMNS};
use linerecon_core::{LineKey, Row};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::query::Query;
use sqlx::{Row as _, Sqlite, SqlitePool};

use crate::error::DbResult;
use crate::migrations::table_columns;

/// Log a progress line every this many rows.
pub(crate) const PROGRESS_EVERY: usize = 1000;

/// `SELECT CAST("a" AS TEXT) AS "a", ... FROM "table"`.
pub(crate) fn select_sql(table: &str, columns: &[String]) -> String {
    let list = columns
        .iter()
        .map(|c| format!("CAST({0} AS TEXT) AS {0}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", list, quote_ident(table))
}

/// `"shop_order_name" = ? AND ...` over the key columns.
pub(crate) fn key_predicate() -> String {
    KEY_COLUMNS
        .iter()
        .map(|c| format!("{} = ?", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Key column list for `ORDER BY` and `ON CONFLICT`.
pub(crate) fn key_list() -> String {
    KEY_COLUMNS
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Binds the four key components in key order.
pub(crate) fn bind_key<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    key: &LineKey,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in key.values() {
        query = query.bind(value.to_string());
    }
    query
}

/// Decodes a row selected with [`select_sql`].
pub(crate) fn decode_row(row: &SqliteRow, columns: &[String]) -> DbResult<Row> {
    let mut out = Row::new();
    for (index, column) in columns.iter().enumerate() {
        let value: Option<String> = row.try_get(index)?;
        out.set(column.as_str(), value);
    }
    Ok(out)
}

/// Reads every row of `table` with every live column, ordered by key when
/// the table is keyed.
pub(crate) async fn fetch_all_rows(
    pool: &SqlitePool,
    table: &str,
    filter: Option<&str>,
) -> DbResult<(Vec<String>, Vec<Row>)> {
    let columns = table_columns(pool, table).await?;
    if columns.is_empty() {
        return Ok((columns, Vec::new()));
    }

    let mut sql = select_sql(table, &columns);
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if KEY_COLUMNS.iter().all(|k| columns.iter().any(|c| c == k)) {
        sql.push_str(" ORDER BY ");
        sql.push_str(&key_list());
    }

    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    let decoded = rows
        .iter()
        .map(|r| decode_row(r, &columns))
        .collect::<DbResult<Vec<_>>>()?;
    Ok((columns, decoded))
}

/// `INSERT INTO "table" ("a", ...) VALUES (?, ...)` with the row's values
/// bound in column order.
pub(crate) fn insert_sql(table: &str, row: &Row) -> String {
    let columns: Vec<String> = row.columns().map(quote_ident).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders
    )
}

/// Binds every value of `row` in column order.
pub(crate) fn bind_row<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    row: &Row,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for (_, value) in row.iter() {
        query = query.bind(value.map(str::to_string));
    }
    query
}
