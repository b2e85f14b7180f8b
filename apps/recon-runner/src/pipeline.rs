//! # Recon Pipeline
//!
//! Runs the stages in order against one store.
//!
//! ## Stages
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          One Pipeline Run                               │
//! │                                                                         │
//! │  Normalize   shop/oms/erp snapshots ──► normalized_lines (rebuilt)     │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  Merge       normalized_lines + oms/erp ──► merged_records (upserted)  │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  Classify    merged_records ──► state tally (not persisted)            │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  Aging       merged_records (match_erp = 0) ──► aging_entries          │
//! │                                                                         │
//! │  Each stage reads what the previous one committed. The first failure   │
//! │  stops the run; committed stages stay committed.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stage reads fresh from the store, so any one of them can be rerun
//! on its own.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use linerecon_core::aging::plan_aging_sync;
use linerecon_core::classify::tally;
use linerecon_core::schema::merged_schema;
use linerecon_core::{
    normalize_lines, plan_merge, AgingSummary, MergeSummary, ReconConfig, Source, StateTally,
};
use linerecon_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{PipelineError, StageError};

// =============================================================================
// Stage
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Stage {
    Normalize,
    Merge,
    Classify,
    Aging,
}

impl Stage {
    /// Stages in run order.
    pub const ALL: [Stage; 4] = [Stage::Normalize, Stage::Merge, Stage::Classify, Stage::Aging];

    pub const fn name(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Merge => "merge",
            Stage::Classify => "classify",
            Stage::Aging => "aging",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of the normalize stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub written: usize,
    pub skipped: usize,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub normalize: NormalizeReport,
    pub merge: MergeSummary,
    pub states: StateTally,
    pub aging: AgingSummary,
}

// =============================================================================
// Stage Entry Points
// =============================================================================

/// Rebuilds `normalized_lines` from the three source tables.
pub async fn normalize(db: &Database, config: &ReconConfig) -> Result<NormalizeReport, StageError> {
    let sources = db.sources();
    let shop = sources.snapshot(Source::Storefront).await?;
    let oms = sources.snapshot(Source::Oms).await?;
    let erp = sources.snapshot(Source::Erp).await?;

    let normalization = normalize_lines(&shop, &oms, &erp, config);
    let written = db.normalized().replace_all(&normalization).await?;

    Ok(NormalizeReport {
        written,
        skipped: normalization.skipped.len(),
    })
}

/// Joins `normalized_lines` against the OMS and ERP tables and syncs
/// `merged_records`.
pub async fn merge(
    db: &Database,
    config: &ReconConfig,
    now: DateTime<FixedOffset>,
) -> Result<MergeSummary, StageError> {
    let sources = db.sources();
    let oms = sources.snapshot(Source::Oms).await?;
    let erp = sources.snapshot(Source::Erp).await?;

    let (columns, lines) = db.normalized().list().await?;
    let existing = db.merged().created_at_index().await?;
    debug!(lines = lines.len(), known = existing.len(), "Merge inputs read");

    let schema = merged_schema(&columns, &oms.columns, &erp.columns);
    let plan = plan_merge(&lines, schema, &oms, &erp, &existing, now, &config.location);
    Ok(db.merged().apply(&plan).await?)
}

/// Classifies every merged line and counts the states.
pub async fn classify(db: &Database, config: &ReconConfig) -> Result<StateTally, StageError> {
    let rows = db.merged().list().await?;
    let states = tally(&rows, &config.location);

    for count in states.counts.iter().filter(|c| c.count > 0) {
        debug!(state = %count.label, count = count.count, "Recon state");
    }
    info!(
        total = states.total,
        gwp_excluded = states.gwp_excluded,
        "Merged lines classified"
    );
    Ok(states)
}

/// Brings `aging_entries` in line with the committed `merged_records`.
pub async fn age(db: &Database, now: DateTime<FixedOffset>) -> Result<AgingSummary, StageError> {
    let merged = db.merged().list().await?;
    let ledger = db.aging().ledger().await?;

    let plan = plan_aging_sync(&merged, &ledger, now);
    Ok(db.aging().apply(&plan).await?)
}

// =============================================================================
// Full Run
// =============================================================================

fn failed(stage: Stage, run_id: Uuid) -> impl FnOnce(StageError) -> PipelineError {
    move |source| {
        let err = PipelineError { stage, source };
        error!(%run_id, stage = %stage, error = %err.chain(), "Stage failed");
        err
    }
}

/// Runs every stage in order. `now` stamps new merged records and changed
/// aging entries.
pub async fn run(
    db: &Database,
    config: &ReconConfig,
    now: DateTime<FixedOffset>,
    run_id: Uuid,
) -> Result<RunReport, PipelineError> {
    info!(%run_id, now = %now.to_rfc3339(), "Starting recon run");

    let normalized = normalize(db, config)
        .await
        .map_err(failed(Stage::Normalize, run_id))?;
    let merged = merge(db, config, now)
        .await
        .map_err(failed(Stage::Merge, run_id))?;
    let states = classify(db, config)
        .await
        .map_err(failed(Stage::Classify, run_id))?;
    let aged = age(db, now).await.map_err(failed(Stage::Aging, run_id))?;

    info!(
        %run_id,
        lines = merged.total,
        missing_erp = aged.missing_erp,
        "Recon run complete"
    );

    Ok(RunReport {
        run_id: run_id.to_string(),
        normalize: normalized,
        merge: merged,
        states,
        aging: aged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = Stage::ALL.iter().map(Stage::to_string).collect();
        assert_eq!(names, ["normalize", "merge", "classify", "aging"]);
        assert_eq!(serde_json::to_string(&Stage::Aging).unwrap(), "\"aging\"");
    }
}
