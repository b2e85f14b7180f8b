//! # Aging Ledger
//!
//! Tracks lines that are missing their ERP counterpart, with a clock that
//! only moves when something about the line actually changed.
//!
//! ## Sync
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              merged_records (match_erp = 0) vs aging_entries            │
//! │                                                                         │
//! │  key only in merged ──────────► INSERT        last_update = now        │
//! │                                                                         │
//! │  key in both, a tracked  ─────► UPDATE        fields refreshed,         │
//! │  field differs                                last_update = now         │
//! │                                                                         │
//! │  key in both, identical ──────► (nothing)     last_update untouched     │
//! │                                                                         │
//! │  key only in ledger ──────────► DELETE        resolved or vanished      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tracked fields are the `shop_`, `oms_`, `erp_` and `match_` columns of the
//! merged record. Values are compared as stored text, NULL distinct from
//! blank. A column the ledger has never seen counts as NULL on the stored
//! side.
//!
//! The ledger trusts the committed match flags; it never re-derives them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::schema::{aging_schema, col, is_tracked_column, TableSchema, AGING_TABLE, MERGED_TABLE};
use crate::types::{LineKey, Row};

// =============================================================================
// Aging Entry
// =============================================================================

/// One row of `aging_entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingEntry {
    pub key: LineKey,
    /// Tracked columns, key columns included.
    pub fields: Row,
    /// Time of the last field-level change (RFC 3339).
    pub last_update: String,
}

impl AgingEntry {
    /// Snapshot of a missing-ERP merged row, stamped with `last_update`.
    pub fn from_merged_row(row: &Row, last_update: String) -> CoreResult<Self> {
        let key = LineKey::from_row(row).map_err(|e| CoreError::malformed(MERGED_TABLE, e.to_string()))?;

        let mut fields = row.clone();
        fields.retain(is_tracked_column);

        Ok(AgingEntry {
            key,
            fields,
            last_update,
        })
    }

    /// Reads an entry back from an `aging_entries` row.
    ///
    /// A missing `last_update` reads as empty; [`plan_aging_sync`] restamps
    /// such entries.
    pub fn from_row(row: &Row) -> CoreResult<Self> {
        let key = LineKey::from_row(row).map_err(|e| CoreError::malformed(AGING_TABLE, e.to_string()))?;
        let last_update = row.text(col::LAST_UPDATE).unwrap_or_default().to_string();

        let mut fields = row.clone();
        fields.retain(|c| c != col::LAST_UPDATE);

        Ok(AgingEntry {
            key,
            fields,
            last_update,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = self.fields.clone();
        self.key.write_into(&mut row);
        row.set(col::LAST_UPDATE, Some(self.last_update.clone()));
        row
    }

    /// Time since the last field-level change.
    ///
    /// `None` when `last_update` is not a valid RFC 3339 timestamp.
    pub fn age(&self, now: DateTime<FixedOffset>) -> Option<Duration> {
        DateTime::parse_from_rfc3339(&self.last_update)
            .ok()
            .map(|since| now.signed_duration_since(since))
    }
}

/// Tracked columns whose value in `current` differs from `stored`.
///
/// Only the columns of `current` are compared.
pub fn changed_columns(current: &Row, stored: &Row) -> Vec<String> {
    current
        .iter()
        .filter(|(column, value)| is_tracked_column(column) && *value != stored.get(column))
        .map(|(column, _)| column.to_string())
        .collect()
}

// =============================================================================
// Aging Plan
// =============================================================================

/// Counts reported by an aging sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AgingSummary {
    /// Lines currently missing their ERP counterpart.
    pub missing_erp: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub skipped: usize,
}

/// An entry whose tracked fields changed since the last sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgingUpdate {
    pub entry: AgingEntry,
    pub changed: Vec<String>,
}

/// What the store has to do to bring `aging_entries` up to date.
#[derive(Debug, Clone)]
pub struct AgingPlan {
    pub schema: TableSchema,
    pub inserts: Vec<AgingEntry>,
    pub updates: Vec<AgingUpdate>,
    pub deletes: Vec<LineKey>,
    pub summary: AgingSummary,
}

impl AgingPlan {
    /// True when applying the plan would not touch the store.
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Plans one ledger sync.
///
/// `merged` is every row of `merged_records`; rows with `match_erp = 1` are
/// ignored here. `ledger` is the current content of `aging_entries`.
pub fn plan_aging_sync(
    merged: &[Row],
    ledger: &BTreeMap<LineKey, AgingEntry>,
    now: DateTime<FixedOffset>,
) -> AgingPlan {
    let now = now.to_rfc3339();
    let mut summary = AgingSummary::default();
    let mut current = BTreeSet::new();
    let mut inserts = Vec::new();
    let mut updates = Vec::new();
    let mut tracked_columns = BTreeSet::new();

    for row in merged.iter().filter(|r| !r.flag(col::MATCH_ERP)) {
        let entry = match AgingEntry::from_merged_row(row, now.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping merged row with an unreadable key");
                summary.skipped += 1;
                continue;
            }
        };
        if !current.insert(entry.key.clone()) {
            continue;
        }
        tracked_columns.extend(entry.fields.columns().map(str::to_string));

        match ledger.get(&entry.key) {
            None => inserts.push(entry),
            Some(stored) => {
                let changed = changed_columns(&entry.fields, &stored.fields);
                if changed.is_empty() && !stored.last_update.is_empty() {
                    summary.unchanged += 1;
                } else {
                    updates.push(AgingUpdate { entry, changed });
                }
            }
        }
    }

    let deletes: Vec<LineKey> = ledger
        .keys()
        .filter(|k| !current.contains(*k))
        .cloned()
        .collect();

    summary.missing_erp = current.len();
    summary.inserted = inserts.len();
    summary.updated = updates.len();
    summary.deleted = deletes.len();

    AgingPlan {
        schema: aging_schema(tracked_columns.iter().map(String::as_str)),
        inserts,
        updates,
        deletes,
        summary,
    }
}

// =============================================================================
// Aging Report
// =============================================================================

/// A ledger entry with its age, as reported to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgedEntry {
    pub key: LineKey,
    pub last_update: String,
    /// Whole seconds since `last_update`, `None` if it does not parse.
    pub age_seconds: Option<i64>,
    pub fields: Row,
}

/// Entries sorted oldest first.
pub fn aging_report(entries: Vec<AgingEntry>, now: DateTime<FixedOffset>) -> Vec<AgedEntry> {
    let mut report: Vec<AgedEntry> = entries
        .into_iter()
        .map(|entry| AgedEntry {
            age_seconds: entry.age(now).map(|d| d.num_seconds()),
            key: entry.key,
            last_update: entry.last_update,
            fields: entry.fields,
        })
        .collect();
    report.sort_by(|a, b| b.age_seconds.cmp(&a.age_seconds).then_with(|| a.key.cmp(&b.key)));
    report
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(ts).unwrap()
    }

    fn merged(line: &str, match_erp: &str, status: Option<&str>) -> Row {
        let mut row: Row = [
            ("shop_order_name", "#1001"),
            ("shop_sku", "ABC"),
            ("shop_normalized_location", "AYS100"),
            ("shop_line_item_id", line),
            ("match_oms", "1"),
            ("match_erp", match_erp),
            ("created_at", "2024-05-01T08:00:00-08:00"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect();
        row.set("oms_fulfillment_id", status.map(str::to_string));
        row
    }

    fn ledger_from(plan: &AgingPlan) -> BTreeMap<LineKey, AgingEntry> {
        plan.inserts
            .iter()
            .map(|e| (e.key.clone(), e.clone()))
            .collect()
    }

    #[test]
    fn test_new_missing_lines_are_inserted() {
        let rows = vec![merged("L1", "0", None), merged("L2", "1", None)];
        let plan = plan_aging_sync(&rows, &BTreeMap::new(), at("2024-05-01T09:00:00-08:00"));

        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].key.line_item_id, "L1");
        assert_eq!(plan.inserts[0].last_update, "2024-05-01T09:00:00-08:00");
        assert!(!plan.inserts[0].fields.contains("created_at"));
        assert!(plan.schema.contains("match_oms"));
        assert!(!plan.schema.contains("created_at"));
    }

    #[test]
    fn test_identical_rerun_is_noop() {
        let rows = vec![merged("L1", "0", None)];
        let first = plan_aging_sync(&rows, &BTreeMap::new(), at("2024-05-01T09:00:00-08:00"));
        let ledger = ledger_from(&first);

        let second = plan_aging_sync(&rows, &ledger, at("2024-05-02T09:00:00-08:00"));

        assert!(second.is_noop());
        assert_eq!(second.summary.unchanged, 1);
    }

    #[test]
    fn test_changed_field_bumps_last_update() {
        let first = plan_aging_sync(
            &[merged("L1", "0", None)],
            &BTreeMap::new(),
            at("2024-05-01T09:00:00-08:00"),
        );
        let ledger = ledger_from(&first);

        let second = plan_aging_sync(
            &[merged("L1", "0", Some("F-9"))],
            &ledger,
            at("2024-05-02T09:00:00-08:00"),
        );

        assert_eq!(second.updates.len(), 1);
        let update = &second.updates[0];
        assert_eq!(update.changed, vec!["oms_fulfillment_id".to_string()]);
        assert_eq!(update.entry.last_update, "2024-05-02T09:00:00-08:00");
        assert_eq!(update.entry.fields.get("oms_fulfillment_id"), Some("F-9"));
    }

    #[test]
    fn test_entry_without_last_update_is_restamped() {
        let rows = vec![merged("L1", "0", None)];
        let first = plan_aging_sync(&rows, &BTreeMap::new(), at("2024-05-01T09:00:00-08:00"));

        let mut stored = first.inserts[0].to_row();
        stored.set("last_update", None);
        let entry = AgingEntry::from_row(&stored).unwrap();
        assert_eq!(entry.last_update, "");
        let ledger: BTreeMap<LineKey, AgingEntry> = [(entry.key.clone(), entry)].into_iter().collect();

        let second = plan_aging_sync(&rows, &ledger, at("2024-05-02T09:00:00-08:00"));
        assert!(second.inserts.is_empty());
        assert_eq!(second.updates.len(), 1);
        assert!(second.updates[0].changed.is_empty());
        assert_eq!(second.updates[0].entry.last_update, "2024-05-02T09:00:00-08:00");
    }

    #[test]
    fn test_resolved_lines_are_deleted() {
        let first = plan_aging_sync(
            &[merged("L1", "0", None), merged("L2", "0", None)],
            &BTreeMap::new(),
            at("2024-05-01T09:00:00-08:00"),
        );
        let ledger = ledger_from(&first);

        // L1 gained its ERP match, L2 vanished from merged_records.
        let second = plan_aging_sync(
            &[merged("L1", "1", None)],
            &ledger,
            at("2024-05-02T09:00:00-08:00"),
        );

        assert_eq!(second.deletes.len(), 2);
        assert_eq!(second.summary.missing_erp, 0);
    }

    #[test]
    fn test_changed_columns_treats_unseen_column_as_null() {
        let stored: Row = [("shop_sku".to_string(), Some("ABC".to_string()))]
            .into_iter()
            .collect();
        let mut current = stored.clone();
        current.set("erp_new_field", None);
        assert!(changed_columns(&current, &stored).is_empty());

        current.set("erp_new_field", Some("x".to_string()));
        assert_eq!(changed_columns(&current, &stored), vec!["erp_new_field".to_string()]);
    }

    #[test]
    fn test_entry_row_round_trip_and_age() {
        let entry = AgingEntry::from_merged_row(
            &merged("L1", "0", None),
            "2024-05-01T09:00:00-08:00".to_string(),
        )
        .unwrap();

        let back = AgingEntry::from_row(&entry.to_row()).unwrap();
        assert_eq!(back, entry);

        let age = entry.age(at("2024-05-01T21:30:00-08:00")).unwrap();
        assert_eq!(age.num_minutes(), 12 * 60 + 30);
    }

    #[test]
    fn test_aging_report_orders_oldest_first() {
        let old = AgingEntry::from_merged_row(&merged("L1", "0", None), "2024-05-01T09:00:00-08:00".to_string()).unwrap();
        let new = AgingEntry::from_merged_row(&merged("L2", "0", None), "2024-05-02T09:00:00-08:00".to_string()).unwrap();

        let report = aging_report(vec![new, old], at("2024-05-03T09:00:00-08:00"));
        assert_eq!(report[0].key.line_item_id, "L1");
        assert_eq!(report[0].age_seconds, Some(2 * 24 * 3600));
    }
}
