//! # Three-Way Merge
//!
//! Joins normalized storefront lines against the OMS and ERP snapshots and
//! plans the upserts/deletes that bring `merged_records` up to date.
//!
//! ## Join
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Storefront Line, Three Sources                  │
//! │                                                                         │
//! │  normalized line      OMS row                 ERP row                   │
//! │  ───────────────      ───────────────────     ──────────────────────    │
//! │  shop_order_name  ═   oms_order_name      ═   erp_cust_order_num        │
//! │  shop_sku         ═   oms_product_id      ═   erp_item_number           │
//! │  shop_normalized_ ═   oms_code(           ═   erp_line_warehouse        │
//! │    location             oms_location)                                   │
//! │                                                                         │
//! │  match_oms = OMS row found                                              │
//! │  match_erp = ERP row found                                              │
//! │  match_all = match_oms ∧ match_erp                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each source names its key columns differently, so the join is driven by
//! a [`JoinColumns`] per source instead of matching column names.
//!
//! ## Upsert Semantics
//! - New key: inserted with `created_at = now`.
//! - Known key: every column rewritten except `created_at`, which is
//!   carried over verbatim from the store.
//! - Key no longer in the normalized set: deleted.
//!
//! Every merged column is written on each pass, NULL included, so a line
//! that loses its OMS or ERP match does not keep stale values from the
//! previous run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use crate::config::LocationRules;
use crate::location::NormalizedLine;
use crate::schema::{col, TableSchema};
use crate::types::{LineKey, Row, Source, SourceTable};

// =============================================================================
// Join Columns
// =============================================================================

/// A source's own names for the (order, sku, location) join triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinColumns {
    pub source: Source,
    pub order_name: &'static str,
    pub sku: &'static str,
    pub location: &'static str,
}

pub const OMS_JOIN: JoinColumns = JoinColumns {
    source: Source::Oms,
    order_name: col::OMS_ORDER_NAME,
    sku: col::OMS_PRODUCT_ID,
    location: col::OMS_LOCATION,
};

pub const ERP_JOIN: JoinColumns = JoinColumns {
    source: Source::Erp,
    order_name: col::ERP_CUST_ORDER_NUM,
    sku: col::ERP_ITEM_NUMBER,
    location: col::ERP_LINE_WAREHOUSE,
};

type JoinKey = (String, String, String);

impl JoinColumns {
    /// Join triple of a source row, with the location in canonical form.
    ///
    /// `None` when any component is blank; such a row can never match.
    fn key_of(&self, row: &Row, rules: &LocationRules) -> Option<JoinKey> {
        let order = row.text(self.order_name)?;
        let sku = row.text(self.sku)?;
        let raw_location = row.text(self.location)?;
        let location = match self.source {
            Source::Oms => rules.oms_code(Some(raw_location)),
            _ => raw_location.to_string(),
        };
        Some((order.to_string(), sku.to_string(), location))
    }

    /// Index of the first row per join triple.
    fn index<'a>(&self, table: &'a SourceTable, rules: &LocationRules) -> HashMap<JoinKey, &'a Row> {
        let mut index = HashMap::with_capacity(table.len());
        let mut unjoinable = 0usize;
        for row in &table.rows {
            match self.key_of(row, rules) {
                Some(key) => {
                    index.entry(key).or_insert(row);
                }
                None => unjoinable += 1,
            }
        }
        if unjoinable > 0 {
            debug!(table = self.source.table(), unjoinable, "Rows without a complete join key");
        }
        index
    }
}

fn join_key(key: &LineKey) -> JoinKey {
    (key.order_name.clone(), key.sku.clone(), key.location.clone())
}

// =============================================================================
// Merged Record
// =============================================================================

/// One row of `merged_records`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub key: LineKey,
    /// First time the key was observed (RFC 3339). Never changes once set.
    pub created_at: String,
    pub match_oms: bool,
    pub match_erp: bool,
    pub match_all: bool,
    /// The normalized storefront row.
    pub shop: Row,
    pub oms: Option<Row>,
    pub erp: Option<Row>,
}

impl MergedRecord {
    /// Flattens the record into a row covering every column of `schema`.
    ///
    /// Columns with no value in this record are present as NULL.
    pub fn to_row(&self, schema: &TableSchema) -> Row {
        let mut row: Row = schema
            .column_names()
            .map(|c| (c.to_string(), None))
            .collect();

        row.extend_from(&self.shop);
        if let Some(oms) = &self.oms {
            row.extend_from(oms);
        }
        if let Some(erp) = &self.erp {
            row.extend_from(erp);
        }

        self.key.write_into(&mut row);
        row.set(col::CREATED_AT, Some(self.created_at.clone()));
        row.set_flag(col::MATCH_OMS, self.match_oms);
        row.set_flag(col::MATCH_ERP, self.match_erp);
        row.set_flag(col::MATCH_ALL, self.match_all);
        row
    }
}

// =============================================================================
// Merge Plan
// =============================================================================

/// Counts reported by a merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MergeSummary {
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub matched_oms: usize,
    pub matched_erp: usize,
    pub matched_all: usize,
}

/// What the store has to do to reflect the current snapshots.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub schema: TableSchema,
    pub upserts: Vec<MergedRecord>,
    pub deletes: Vec<LineKey>,
    pub summary: MergeSummary,
}

/// Plans one merge pass.
///
/// `existing` maps every key currently in `merged_records` to its stored
/// `created_at`. `now` is the pass time in the reference offset.
pub fn plan_merge(
    lines: &[NormalizedLine],
    schema: TableSchema,
    oms: &SourceTable,
    erp: &SourceTable,
    existing: &BTreeMap<LineKey, String>,
    now: DateTime<FixedOffset>,
    rules: &LocationRules,
) -> MergePlan {
    let oms_index = OMS_JOIN.index(oms, rules);
    let erp_index = ERP_JOIN.index(erp, rules);
    let now = now.to_rfc3339();

    let mut summary = MergeSummary::default();
    let mut upserts = Vec::with_capacity(lines.len());
    let mut current = BTreeSet::new();

    for line in lines {
        // Normalized keys are unique; a repeat here would be a second
        // write to the same row.
        if !current.insert(line.key.clone()) {
            continue;
        }

        let join = join_key(&line.key);
        let oms_row = oms_index.get(&join).map(|r| (*r).clone());
        let erp_row = erp_index.get(&join).map(|r| (*r).clone());

        let created_at = match existing.get(&line.key) {
            Some(created_at) => {
                summary.updated += 1;
                created_at.clone()
            }
            None => {
                summary.inserted += 1;
                now.clone()
            }
        };

        let record = MergedRecord {
            key: line.key.clone(),
            created_at,
            match_oms: oms_row.is_some(),
            match_erp: erp_row.is_some(),
            match_all: oms_row.is_some() && erp_row.is_some(),
            shop: line.to_row(),
            oms: oms_row,
            erp: erp_row,
        };

        summary.matched_oms += usize::from(record.match_oms);
        summary.matched_erp += usize::from(record.match_erp);
        summary.matched_all += usize::from(record.match_all);
        upserts.push(record);
    }

    let deletes: Vec<LineKey> = existing
        .keys()
        .filter(|k| !current.contains(*k))
        .cloned()
        .collect();

    summary.total = upserts.len();
    summary.deleted = deletes.len();

    MergePlan {
        schema,
        upserts,
        deletes,
        summary,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use crate::location::normalize_lines;
    use crate::schema::merged_schema;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    fn table(source: Source, rows: Vec<Row>) -> SourceTable {
        let mut columns: Vec<String> = Vec::new();
        for r in &rows {
            for c in r.columns() {
                if !columns.iter().any(|existing| existing == c) {
                    columns.push(c.to_string());
                }
            }
        }
        SourceTable::new(source, columns, rows)
    }

    fn at(ts: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(ts).unwrap()
    }

    struct Fixture {
        shop: SourceTable,
        oms: SourceTable,
        erp: SourceTable,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                shop: table(
                    Source::Storefront,
                    vec![
                        row(&[
                            ("shop_order_name", "#1001"),
                            ("shop_sku", "ABC"),
                            ("shop_assigned_location", "100 Downtown"),
                            ("shop_line_item_id", "L1"),
                        ]),
                        row(&[
                            ("shop_order_name", "#1002"),
                            ("shop_sku", "XYZ"),
                            ("shop_assigned_location", "100 Downtown"),
                            ("shop_line_item_id", "L2"),
                        ]),
                    ],
                ),
                oms: table(
                    Source::Oms,
                    vec![row(&[
                        ("oms_order_name", "#1001"),
                        ("oms_product_id", "ABC"),
                        ("oms_location", "10100"),
                        ("oms_fulfillment_id", "F-1"),
                    ])],
                ),
                erp: table(
                    Source::Erp,
                    vec![row(&[
                        ("erp_cust_order_num", "#1001"),
                        ("erp_item_number", "ABC"),
                        ("erp_line_warehouse", "AYS100"),
                        ("erp_warehouse_status", "Ready"),
                    ])],
                ),
            }
        }

        fn plan(&self, existing: &BTreeMap<LineKey, String>, now: &str) -> MergePlan {
            let config = ReconConfig::default();
            let normalized = normalize_lines(&self.shop, &self.oms, &self.erp, &config);
            let schema = merged_schema(&normalized.columns(), &self.oms.columns, &self.erp.columns);
            plan_merge(
                &normalized.lines,
                schema,
                &self.oms,
                &self.erp,
                existing,
                at(now),
                &config.location,
            )
        }
    }

    #[test]
    fn test_match_flags() {
        let plan = Fixture::new().plan(&BTreeMap::new(), "2024-05-01T08:00:00-08:00");

        assert_eq!(plan.upserts.len(), 2);
        let matched = &plan.upserts[0];
        assert!(matched.match_oms && matched.match_erp && matched.match_all);

        let unmatched = &plan.upserts[1];
        assert!(!unmatched.match_oms && !unmatched.match_erp && !unmatched.match_all);

        assert_eq!(plan.summary.inserted, 2);
        assert_eq!(plan.summary.matched_all, 1);
    }

    #[test]
    fn test_created_at_preserved_for_known_keys() {
        let fixture = Fixture::new();
        let first = fixture.plan(&BTreeMap::new(), "2024-05-01T08:00:00-08:00");
        let existing: BTreeMap<LineKey, String> = first
            .upserts
            .iter()
            .map(|r| (r.key.clone(), r.created_at.clone()))
            .collect();

        let second = fixture.plan(&existing, "2024-05-02T08:00:00-08:00");

        assert_eq!(second.summary.updated, 2);
        assert_eq!(second.summary.inserted, 0);
        for record in &second.upserts {
            assert_eq!(record.created_at, "2024-05-01T08:00:00-08:00");
        }
    }

    #[test]
    fn test_vanished_keys_are_deleted() {
        let fixture = Fixture::new();
        let mut existing = BTreeMap::new();
        let gone = LineKey::new("#0999", "OLD", "AYS100", "L0").unwrap();
        existing.insert(gone.clone(), "2024-04-01T08:00:00-08:00".to_string());

        let plan = fixture.plan(&existing, "2024-05-01T08:00:00-08:00");

        assert_eq!(plan.deletes, vec![gone]);
        assert_eq!(plan.summary.deleted, 1);
    }

    #[test]
    fn test_to_row_nulls_missing_source_columns() {
        let plan = Fixture::new().plan(&BTreeMap::new(), "2024-05-01T08:00:00-08:00");

        let unmatched = plan.upserts[1].to_row(&plan.schema);
        assert!(unmatched.contains("oms_fulfillment_id"));
        assert_eq!(unmatched.get("oms_fulfillment_id"), None);
        assert_eq!(unmatched.get("erp_warehouse_status"), None);
        assert_eq!(unmatched.get("match_all"), Some("0"));

        let matched = plan.upserts[0].to_row(&plan.schema);
        assert_eq!(matched.get("erp_warehouse_status"), Some("Ready"));
        assert_eq!(matched.get("created_at"), Some("2024-05-01T08:00:00-08:00"));
        assert_eq!(matched.len(), plan.schema.columns.len());
    }

    #[test]
    fn test_oms_location_is_canonicalized_before_join() {
        let mut fixture = Fixture::new();
        fixture.erp = SourceTable::empty(Source::Erp);

        let plan = fixture.plan(&BTreeMap::new(), "2024-05-01T08:00:00-08:00");

        assert!(plan.upserts[0].match_oms);
        assert!(!plan.upserts[0].match_erp);
    }
}
