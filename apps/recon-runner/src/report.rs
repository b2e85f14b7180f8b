//! # Reports
//!
//! Read-only queries over the committed store for the `report` and `aging`
//! commands. Nothing here writes.

use chrono::{DateTime, FixedOffset};
use linerecon_core::aging::{aging_report, AgedEntry};
use linerecon_core::{DiscrepancyView, ReconConfig, Row};
use linerecon_db::{Database, DbResult};
use serde::Serialize;
use tracing::debug;

/// Rows of one discrepancy view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewReport {
    pub view: DiscrepancyView,
    pub count: usize,
    pub rows: Vec<Row>,
}

/// Filters `merged_records` through `view`.
pub async fn view(
    db: &Database,
    config: &ReconConfig,
    view: DiscrepancyView,
    now: DateTime<FixedOffset>,
) -> DbResult<ViewReport> {
    let merged = db.merged().list().await?;
    let rows: Vec<Row> = view
        .filter(&merged, now, config.aging_view_threshold())
        .into_iter()
        .cloned()
        .collect();

    debug!(view = %view, matched = rows.len(), of = merged.len(), "View filtered");
    Ok(ViewReport {
        view,
        count: rows.len(),
        rows,
    })
}

/// The aging ledger with ages, oldest first.
pub async fn aging(db: &Database, now: DateTime<FixedOffset>) -> DbResult<Vec<AgedEntry>> {
    let entries = db.aging().list().await?;
    Ok(aging_report(entries, now))
}
