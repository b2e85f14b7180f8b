//! # Location Normalizer
//!
//! Folds storefront and OMS location identifiers into one warehouse-code
//! namespace and rebuilds the normalized storefront table.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Resolving A Line's Location                        │
//! │                                                                         │
//! │  storefront assigned location ──┐                                       │
//! │                                 │  == placeholder                       │
//! │  OMS location for               │  ("Alo Distribution Centers")         │
//! │  (order_name, sku) ─────────────┤  and OMS location present?            │
//! │                                 │                                       │
//! │                   yes ──────────┴────────── no                          │
//! │                    │                         │                          │
//! │                    ▼                         ▼                          │
//! │             oms_code(oms)           storefront_code(assigned)           │
//! │                                                                         │
//! │  oms_code:        "10123" → "AYS123", "NETWORK" → "NETWORK"             │
//! │  storefront_code: "100 Downtown" → "AYS100"                             │
//! │  both:            absent / blank / "N/A" → "UNKNOWN"                    │
//! │                   anything else passes through trimmed                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The normalized table is a stateless transform: it is rebuilt from the
//! source snapshots on every sync and has no memory of prior runs.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{LocationRules, ReconConfig};
use crate::error::{CoreError, CoreResult};
use crate::schema::{col, normalized_schema, TableSchema};
use crate::types::{LineKey, Row, Source, SourceTable};
use crate::validation::non_blank;

/// OMS location id that is already a canonical code.
const OMS_NETWORK: &str = "NETWORK";

/// Numeric prefix of OMS location ids.
const OMS_NUMERIC_PREFIX: &str = "10";

/// Leading digits of a storefront location name that form the store number.
const STOREFRONT_STORE_DIGITS: usize = 3;

// =============================================================================
// Location Codes
// =============================================================================

impl LocationRules {
    /// True for absent, blank and alias ("N/A") values.
    pub fn is_unknown(&self, raw: Option<&str>) -> bool {
        match non_blank(raw) {
            None => true,
            Some(value) => self
                .unknown_aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(value)),
        }
    }

    /// Canonical code for a storefront location name.
    ///
    /// ```rust
    /// use linerecon_core::LocationRules;
    ///
    /// let rules = LocationRules::default();
    /// assert_eq!(rules.storefront_code(Some("100 Downtown")), "AYS100");
    /// assert_eq!(rules.storefront_code(Some("AS")), "AS");
    /// assert_eq!(rules.storefront_code(None), "UNKNOWN");
    /// ```
    pub fn storefront_code(&self, raw: Option<&str>) -> String {
        if self.is_unknown(raw) {
            return self.unknown_label.clone();
        }
        let value = raw.unwrap_or_default().trim();

        let digits: String = value.chars().take(STOREFRONT_STORE_DIGITS).collect();
        if digits.len() == STOREFRONT_STORE_DIGITS && digits.chars().all(|c| c.is_ascii_digit()) {
            return format!("{}{}", self.numeric_prefix, digits);
        }

        value.to_string()
    }

    /// Canonical code for an OMS location id.
    ///
    /// ```rust
    /// use linerecon_core::LocationRules;
    ///
    /// let rules = LocationRules::default();
    /// assert_eq!(rules.oms_code(Some("10100")), "AYS100");
    /// assert_eq!(rules.oms_code(Some("NETWORK")), "NETWORK");
    /// assert_eq!(rules.oms_code(Some("AYS100")), "AYS100");
    /// ```
    pub fn oms_code(&self, raw: Option<&str>) -> String {
        if self.is_unknown(raw) {
            return self.unknown_label.clone();
        }
        let value = raw.unwrap_or_default().trim();

        if value == OMS_NETWORK {
            return value.to_string();
        }
        if let Some(rest) = value.strip_prefix(OMS_NUMERIC_PREFIX) {
            return format!("{}{}", self.numeric_prefix, rest);
        }

        value.to_string()
    }

    /// True when `assigned` is the distribution-center placeholder.
    pub fn is_placeholder(&self, assigned: Option<&str>) -> bool {
        non_blank(assigned) == Some(self.placeholder.as_str())
    }

    /// Resolves a line's canonical location from the storefront's assigned
    /// location and the OMS-reported one.
    pub fn resolve(&self, assigned: Option<&str>, oms: Option<&str>) -> String {
        match non_blank(oms) {
            Some(oms) if self.is_placeholder(assigned) => self.oms_code(Some(oms)),
            _ => self.storefront_code(assigned),
        }
    }
}

// =============================================================================
// Normalized Line
// =============================================================================

/// One storefront line with its resolved location and inherited flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine {
    pub key: LineKey,
    /// Storefront's raw assigned location.
    pub assigned_location: Option<String>,
    /// ERP preorder flag looked up by (order_name, sku).
    pub preorder_flag: Option<String>,
    pub is_gwp_line: bool,
    /// Every other storefront column.
    pub fields: Row,
}

impl NormalizedLine {
    /// Columns owned by the struct fields rather than `fields`.
    const DERIVED: [&'static str; 7] = [
        col::SHOP_ORDER_NAME,
        col::SHOP_SKU,
        col::SHOP_NORMALIZED_LOCATION,
        col::SHOP_LINE_ITEM_ID,
        col::SHOP_ASSIGNED_LOCATION,
        col::SHOP_PREORDER_FLAG,
        col::SHOP_IS_GWP_LINE,
    ];

    /// Flattens the line into a `normalized_lines` row.
    pub fn to_row(&self) -> Row {
        let mut row = self.fields.clone();
        self.key.write_into(&mut row);
        row.set(col::SHOP_ASSIGNED_LOCATION, self.assigned_location.clone());
        row.set(col::SHOP_PREORDER_FLAG, self.preorder_flag.clone());
        row.set_flag(col::SHOP_IS_GWP_LINE, self.is_gwp_line);
        row
    }

    /// Reads a line back from a `normalized_lines` row.
    pub fn from_row(row: &Row) -> CoreResult<Self> {
        let key = LineKey::from_row(row)
            .map_err(|e| CoreError::malformed(crate::schema::NORMALIZED_TABLE, e.to_string()))?;

        let mut fields = row.clone();
        fields.retain(|c| !Self::DERIVED.contains(&c));

        Ok(NormalizedLine {
            key,
            assigned_location: row.get(col::SHOP_ASSIGNED_LOCATION).map(str::to_string),
            preorder_flag: row.text(col::SHOP_PREORDER_FLAG).map(str::to_string),
            is_gwp_line: row.flag(col::SHOP_IS_GWP_LINE),
            fields,
        })
    }
}

// =============================================================================
// Normalization Pass
// =============================================================================

/// A source row that was left out of a stage's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub source: Source,
    /// Position of the row in its source snapshot.
    pub index: usize,
    pub reason: String,
}

/// Output of one normalization pass.
#[derive(Debug, Clone)]
pub struct Normalization {
    /// Declared shape of `normalized_lines` for this pass.
    pub schema: TableSchema,
    pub lines: Vec<NormalizedLine>,
    pub skipped: Vec<SkippedRow>,
}

impl Normalization {
    /// Column names of `normalized_lines`, in declaration order.
    pub fn columns(&self) -> Vec<String> {
        self.schema.column_names().map(str::to_string).collect()
    }
}

/// First value of `value_column` per (`order_column`, `sku_column`) pair.
fn first_by_order_and_sku<'a>(
    table: &'a SourceTable,
    order_column: &str,
    sku_column: &str,
    value_column: &str,
) -> HashMap<(&'a str, &'a str), Option<&'a str>> {
    let mut index = HashMap::new();
    for row in &table.rows {
        if let (Some(order), Some(sku)) = (row.text(order_column), row.text(sku_column)) {
            index
                .entry((order, sku))
                .or_insert_with(|| row.text(value_column));
        }
    }
    index
}

/// Rebuilds the normalized storefront table from the three source snapshots.
///
/// Storefront lines missing a key component are skipped with a warning.
/// When two lines resolve to the same [`LineKey`] the first one wins.
pub fn normalize_lines(
    shop: &SourceTable,
    oms: &SourceTable,
    erp: &SourceTable,
    config: &ReconConfig,
) -> Normalization {
    let oms_locations =
        first_by_order_and_sku(oms, col::OMS_ORDER_NAME, col::OMS_PRODUCT_ID, col::OMS_LOCATION);
    let erp_preorders = first_by_order_and_sku(
        erp,
        col::ERP_CUST_ORDER_NUM,
        col::ERP_ITEM_NUMBER,
        col::ERP_PREORDER,
    );

    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(shop.len());
    let mut skipped = Vec::new();

    for (index, row) in shop.rows.iter().enumerate() {
        let order_name = row.text(col::SHOP_ORDER_NAME).unwrap_or_default();
        let sku = row.text(col::SHOP_SKU).unwrap_or_default();
        let assigned = row.get(col::SHOP_ASSIGNED_LOCATION);

        let oms_location = oms_locations.get(&(order_name, sku)).copied().flatten();
        let location = config.location.resolve(assigned, oms_location);

        let key = match LineKey::new(
            order_name,
            sku,
            &location,
            row.get(col::SHOP_LINE_ITEM_ID).unwrap_or_default(),
        ) {
            Ok(key) => key,
            Err(e) => {
                warn!(table = shop.source.table(), index, error = %e, "Skipping malformed storefront line");
                skipped.push(SkippedRow {
                    source: shop.source,
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !seen.insert(key.clone()) {
            warn!(table = shop.source.table(), index, key = %key, "Skipping duplicate storefront line");
            skipped.push(SkippedRow {
                source: shop.source,
                index,
                reason: format!("duplicate line key {}", key),
            });
            continue;
        }

        let mut fields = row.clone();
        fields.retain(|c| !NormalizedLine::DERIVED.contains(&c));

        lines.push(NormalizedLine {
            is_gwp_line: row.flag(col::SHOP_IS_GWP_LINE) || config.is_gwp_sku(&key.sku),
            preorder_flag: erp_preorders
                .get(&(key.order_name.as_str(), key.sku.as_str()))
                .copied()
                .flatten()
                .map(str::to_string),
            assigned_location: assigned.map(str::to_string),
            key,
            fields,
        });
    }

    Normalization {
        schema: normalized_schema(&shop.columns),
        lines,
        skipped,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
