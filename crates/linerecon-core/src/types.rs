//! # Domain Types
//!
//! Core types shared by every reconciliation stage.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Source      │   │   SourceTable   │   │       Row       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Storefront     │   │  source         │   │  column → text  │       │
//! │  │  Oms            │   │  columns        │   │  (NULL = None)  │       │
//! │  │  Erp            │   │  rows           │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │  LineKey (order_name, sku, normalized_location, line_item_id) │     │
//! │  │  The only stable identity of a line across all three sources  │     │
//! │  │  and across repeated syncs.                                   │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Rows Are Column Maps
//! The three source systems report different, evolving column sets. The
//! recon tables are the union of those columns, so a row is an ordered map
//! of column name to text value. The handful of columns the pipeline
//! actually reasons about are named in [`crate::schema::col`] and read
//! through typed accessors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::schema::col;
use crate::validation::{non_blank, validate_key_component};

// =============================================================================
// Row
// =============================================================================

/// One table row: column name → text value (`None` = SQL NULL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Option<String>>);

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Row(BTreeMap::new())
    }

    /// Raw value of a column. Blank strings are returned as-is.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(|v| v.as_deref())
    }

    /// Trimmed value of a column, `None` when absent, NULL or blank.
    pub fn text(&self, column: &str) -> Option<&str> {
        non_blank(self.get(column))
    }

    /// True when the column holds a non-blank value.
    pub fn is_present(&self, column: &str) -> bool {
        self.text(column).is_some()
    }

    /// Boolean flag stored as `1`/`0` (also accepts `true`).
    pub fn flag(&self, column: &str) -> bool {
        matches!(self.text(column), Some("1") | Some("true") | Some("TRUE"))
    }

    /// Sets a column value, replacing any previous one.
    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        self.0.insert(column.into(), value);
    }

    /// Sets a `1`/`0` flag column.
    pub fn set_flag(&mut self, column: impl Into<String>, value: bool) {
        self.set(column, Some(if value { "1" } else { "0" }.to_string()));
    }

    /// True when the column exists in this row (even if NULL).
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Column names, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// (column, value) pairs, sorted by column.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Keeps only the columns accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|k, _| keep(k));
    }

    /// Copies every column of `other` into this row.
    pub fn extend_from(&mut self, other: &Row) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Row(iter.into_iter().collect())
    }
}

// =============================================================================
// Source
// =============================================================================

/// The three systems of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// E-commerce platform: open/unfulfilled lines. The driving side.
    Storefront,
    /// Order-management/fulfillment system.
    Oms,
    /// Warehouse ERP.
    Erp,
}

impl Source {
    /// Column prefix used for this source in every recon table.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Source::Storefront => "shop_",
            Source::Oms => "oms_",
            Source::Erp => "erp_",
        }
    }

    /// Name of the source table filled by the ingestion collaborator.
    pub const fn table(&self) -> &'static str {
        match self {
            Source::Storefront => "shop_open_lines",
            Source::Oms => "oms_open_lines",
            Source::Erp => "erp_open_lines",
        }
    }

    /// Returns `column` with this source's prefix, adding it if missing.
    ///
    /// ```rust
    /// use linerecon_core::Source;
    ///
    /// assert_eq!(Source::Oms.prefixed("is_gwp_line"), "oms_is_gwp_line");
    /// assert_eq!(Source::Oms.prefixed("oms_location"), "oms_location");
    /// ```
    pub fn prefixed(&self, column: &str) -> String {
        if column.starts_with(self.prefix()) {
            column.to_string()
        } else {
            format!("{}{}", self.prefix(), column)
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Storefront => write!(f, "storefront"),
            Source::Oms => write!(f, "oms"),
            Source::Erp => write!(f, "erp"),
        }
    }
}

// =============================================================================
// Source Table
// =============================================================================

/// Snapshot of one source table, with every column carrying its source prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    pub source: Source,
    /// Prefixed column names, in table order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl SourceTable {
    /// Builds a snapshot from raw column names and rows keyed by those names.
    ///
    /// Columns that lack the source prefix (a collaborator's `is_gwp_line`,
    /// say) get it here, so two sources can never collide downstream.
    pub fn new(source: Source, raw_columns: Vec<String>, raw_rows: Vec<Row>) -> Self {
        let columns = raw_columns.iter().map(|c| source.prefixed(c)).collect();
        let rows = raw_rows
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (source.prefixed(k), v.map(str::to_string)))
                    .collect()
            })
            .collect();

        SourceTable {
            source,
            columns,
            rows,
        }
    }

    /// An empty snapshot with no columns.
    pub fn empty(source: Source) -> Self {
        SourceTable {
            source,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

// =============================================================================
// Line Key
// =============================================================================

/// Composite natural key of an order line.
///
/// Unique across `normalized_lines`, `merged_records` and `aging_entries`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub order_name: String,
    pub sku: String,
    /// Canonical warehouse code (see [`crate::location`]).
    pub location: String,
    pub line_item_id: String,
}

impl LineKey {
    /// Builds a key, trimming every component. Blank components are rejected.
    pub fn new(
        order_name: &str,
        sku: &str,
        location: &str,
        line_item_id: &str,
    ) -> Result<Self, ValidationError> {
        Ok(LineKey {
            order_name: validate_key_component(col::SHOP_ORDER_NAME, order_name)?.to_string(),
            sku: validate_key_component(col::SHOP_SKU, sku)?.to_string(),
            location: validate_key_component(col::SHOP_NORMALIZED_LOCATION, location)?
                .to_string(),
            line_item_id: validate_key_component(col::SHOP_LINE_ITEM_ID, line_item_id)?
                .to_string(),
        })
    }

    /// Reads the key from a normalized, merged or aging row.
    pub fn from_row(row: &Row) -> Result<Self, ValidationError> {
        let part = |column: &str| row.get(column).unwrap_or_default().to_string();
        LineKey::new(
            &part(col::SHOP_ORDER_NAME),
            &part(col::SHOP_SKU),
            &part(col::SHOP_NORMALIZED_LOCATION),
            &part(col::SHOP_LINE_ITEM_ID),
        )
    }

    /// Writes the four key columns into `row`.
    pub fn write_into(&self, row: &mut Row) {
        row.set(col::SHOP_ORDER_NAME, Some(self.order_name.clone()));
        row.set(col::SHOP_SKU, Some(self.sku.clone()));
        row.set(col::SHOP_NORMALIZED_LOCATION, Some(self.location.clone()));
        row.set(col::SHOP_LINE_ITEM_ID, Some(self.line_item_id.clone()));
    }

    /// Key values in [`crate::schema::KEY_COLUMNS`] order.
    pub fn values(&self) -> [&str; 4] {
        [
            &self.order_name,
            &self.sku,
            &self.location,
            &self.line_item_id,
        ]
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.order_name, self.sku, self.location, self.line_item_id
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Option<&str>)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_row_text_treats_blank_as_absent() {
        let r = row(&[
            ("erp_warehouse_status", Some("  ")),
            ("oms_fulfillment_id", Some(" F-1 ")),
            ("erp_preorder", None),
        ]);

        assert_eq!(r.get("erp_warehouse_status"), Some("  "));
        assert_eq!(r.text("erp_warehouse_status"), None);
        assert_eq!(r.text("oms_fulfillment_id"), Some("F-1"));
        assert!(!r.is_present("erp_preorder"));
        assert!(r.contains("erp_preorder"));
        assert!(!r.contains("missing"));
    }

    #[test]
    fn test_row_flags() {
        let mut r = Row::new();
        r.set_flag("match_oms", true);
        r.set_flag("match_erp", false);

        assert!(r.flag("match_oms"));
        assert!(!r.flag("match_erp"));
        assert!(!r.flag("not_there"));
        assert_eq!(r.get("match_erp"), Some("0"));
    }

    #[test]
    fn test_source_table_prefixes_columns() {
        let raw = row(&[("oms_location", Some("AS")), ("is_gwp_line", Some("0"))]);
        let table = SourceTable::new(
            Source::Oms,
            vec!["oms_location".to_string(), "is_gwp_line".to_string()],
            vec![raw],
        );

        assert_eq!(table.columns, vec!["oms_location", "oms_is_gwp_line"]);
        assert_eq!(table.rows[0].get("oms_is_gwp_line"), Some("0"));
        assert!(!table.rows[0].contains("is_gwp_line"));
    }

    #[test]
    fn test_line_key_round_trips_through_row() {
        let key = LineKey::new(" #1001", "ABC", "AYS100", "L1 ").unwrap();
        assert_eq!(key.order_name, "#1001");
        assert_eq!(key.line_item_id, "L1");

        let mut r = Row::new();
        key.write_into(&mut r);
        assert_eq!(LineKey::from_row(&r).unwrap(), key);
        assert_eq!(key.to_string(), "#1001/ABC/AYS100/L1");
    }

    #[test]
    fn test_line_key_rejects_blank_components() {
        assert!(LineKey::new("#1001", "", "AYS100", "L1").is_err());
        assert!(LineKey::from_row(&Row::new()).is_err());
    }
}
