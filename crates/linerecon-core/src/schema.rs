//! # Table Schemas
//!
//! Explicit, versioned definitions of the three recon tables.
//!
//! ## Base Schema + Additive Extension
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How A Recon Table Gets Its Columns                   │
//! │                                                                         │
//! │  migrations/sqlite/001_initial_schema.sql                              │
//! │       │  base columns every deployment has (keys, flags, known         │
//! │       │  source fields)                                                │
//! │       ▼                                                                 │
//! │  TableSchema (this module)                                             │
//! │       │  base columns ∪ columns observed in the source snapshots       │
//! │       ▼                                                                 │
//! │  ensure_table_schema (linerecon-db, before every sync)                 │
//! │       │  ALTER TABLE .. ADD COLUMN for anything missing                │
//! │       │  never DROP, never re-CREATE                                   │
//! │       ▼                                                                 │
//! │  schema_registry: (table, version, column_count, migrated_at)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keeping tables instead of re-creating them is what lets `created_at` and
//! `last_update` survive a source that grows a new column.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::validate_column_name;

// =============================================================================
// Column Names
// =============================================================================

/// Column names the pipeline reasons about.
///
/// Everything else is carried through untouched.
pub mod col {
    // Storefront (also the key columns of every recon table)
    pub const SHOP_ORDER_NAME: &str = "shop_order_name";
    pub const SHOP_ORDER_ID: &str = "shop_order_id";
    pub const SHOP_CREATED_AT: &str = "shop_created_at";
    pub const SHOP_OMS_ORDER_NUMBER: &str = "shop_oms_order_number";
    pub const SHOP_ASSIGNED_LOCATION: &str = "shop_assigned_location";
    pub const SHOP_LINE_ITEM_ID: &str = "shop_line_item_id";
    pub const SHOP_SKU: &str = "shop_sku";

    // Added by the location normalizer
    pub const SHOP_NORMALIZED_LOCATION: &str = "shop_normalized_location";
    pub const SHOP_PREORDER_FLAG: &str = "shop_preorder_flag";
    pub const SHOP_IS_GWP_LINE: &str = "shop_is_gwp_line";

    // OMS
    pub const OMS_ORDER_NAME: &str = "oms_order_name";
    pub const OMS_PRODUCT_ID: &str = "oms_product_id";
    pub const OMS_LOCATION: &str = "oms_location";
    pub const OMS_FULFILLMENT_ID: &str = "oms_fulfillment_id";

    // ERP
    pub const ERP_CUST_ORDER_NUM: &str = "erp_cust_order_num";
    pub const ERP_ITEM_NUMBER: &str = "erp_item_number";
    pub const ERP_LINE_WAREHOUSE: &str = "erp_line_warehouse";
    pub const ERP_WAREHOUSE_STATUS: &str = "erp_warehouse_status";
    pub const ERP_PREORDER: &str = "erp_preorder";

    // Merge metadata
    pub const CREATED_AT: &str = "created_at";
    pub const MATCH_OMS: &str = "match_oms";
    pub const MATCH_ERP: &str = "match_erp";
    pub const MATCH_ALL: &str = "match_all";

    // Aging metadata
    pub const LAST_UPDATE: &str = "last_update";
}

/// LineKey columns, in key order.
pub const KEY_COLUMNS: [&str; 4] = [
    col::SHOP_ORDER_NAME,
    col::SHOP_SKU,
    col::SHOP_NORMALIZED_LOCATION,
    col::SHOP_LINE_ITEM_ID,
];

/// Match flag columns of `merged_records`.
pub const MATCH_COLUMNS: [&str; 3] = [col::MATCH_OMS, col::MATCH_ERP, col::MATCH_ALL];

/// Prefixes of the columns the aging ledger snapshots.
pub const TRACKED_PREFIXES: [&str; 4] = ["shop_", "oms_", "erp_", "match_"];

// =============================================================================
// Table Names & Versions
// =============================================================================

pub const NORMALIZED_TABLE: &str = "normalized_lines";
pub const MERGED_TABLE: &str = "merged_records";
pub const AGING_TABLE: &str = "aging_entries";

/// Bump when the base column set of a table changes (with a new migration).
pub const NORMALIZED_SCHEMA_VERSION: u32 = 1;
pub const MERGED_SCHEMA_VERSION: u32 = 1;
pub const AGING_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Column & Table Definitions
// =============================================================================

/// SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Integer,
}

impl ColumnType {
    pub const fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
        }
    }
}

/// One column of a recon table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn text(name: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            column_type: ColumnType::Text,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            column_type: ColumnType::Integer,
        }
    }

    /// `"name" TYPE` fragment for DDL.
    pub fn ddl(&self) -> String {
        format!("{} {}", quote_ident(&self.name), self.column_type.sql())
    }
}

/// Declared shape of a recon table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub version: u32,
    /// Unique key columns.
    pub key: Vec<String>,
    /// Every column, key columns included, in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Starts a schema with the LineKey columns.
    fn keyed(name: &str, version: u32) -> Self {
        TableSchema {
            name: name.to_string(),
            version,
            key: KEY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            columns: KEY_COLUMNS.iter().map(|c| ColumnDef::text(*c)).collect(),
        }
    }

    /// Appends a column unless one with the same name exists.
    pub fn push(&mut self, column: ColumnDef) {
        if !self.contains(&column.name) {
            self.columns.push(column);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns of this schema the live table does not have yet.
    ///
    /// Columns the live table has beyond the schema are left alone; the
    /// migration is additive only.
    pub fn missing_from<'a>(&'a self, existing: &[String]) -> Vec<&'a ColumnDef> {
        let existing: HashSet<&str> = existing.iter().map(String::as_str).collect();
        self.columns
            .iter()
            .filter(|c| !existing.contains(c.name.as_str()))
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement with a unique key constraint.
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDef::ddl).collect();
        let key = self
            .key
            .iter()
            .map(|k| quote_ident(k))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("PRIMARY KEY ({})", key));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(&self.name),
            parts.join(",\n    ")
        )
    }

    /// Checks identifiers, duplicates and that the key is declared.
    pub fn validate(&self) -> CoreResult<()> {
        validate_column_name(&self.name)?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            validate_column_name(&column.name)?;
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: format!("{} column", self.name),
                    value: column.name.clone(),
                }
                .into());
            }
        }

        for key in &self.key {
            if !seen.contains(key.as_str()) {
                return Err(CoreError::InvalidSchema {
                    table: self.name.clone(),
                    reason: format!("key column '{}' is not declared", key),
                });
            }
        }

        Ok(())
    }
}

// =============================================================================
// Schema Builders
// =============================================================================

/// `normalized_lines`: every storefront column plus the normalizer's additions.
pub fn normalized_schema(shop_columns: &[String]) -> TableSchema {
    let mut schema = TableSchema::keyed(NORMALIZED_TABLE, NORMALIZED_SCHEMA_VERSION);
    for name in [
        col::SHOP_PREORDER_FLAG,
        col::SHOP_IS_GWP_LINE,
        col::SHOP_ASSIGNED_LOCATION,
    ] {
        schema.push(ColumnDef::text(name));
    }
    for name in shop_columns {
        schema.push(ColumnDef::text(name.as_str()));
    }
    schema
}

/// `merged_records`: keys, `created_at`, match flags, then the union of the
/// normalized, OMS and ERP columns (already source-prefixed).
pub fn merged_schema(
    normalized_columns: &[String],
    oms_columns: &[String],
    erp_columns: &[String],
) -> TableSchema {
    let mut schema = TableSchema::keyed(MERGED_TABLE, MERGED_SCHEMA_VERSION);
    schema.push(ColumnDef::text(col::CREATED_AT));
    for flag in MATCH_COLUMNS {
        schema.push(ColumnDef::integer(flag));
    }
    for name in normalized_columns
        .iter()
        .chain(oms_columns)
        .chain(erp_columns)
    {
        schema.push(ColumnDef::text(name.as_str()));
    }
    schema
}

/// `aging_entries`: the tracked columns of the current snapshot plus
/// `last_update`. Match flags are kept as `0`/`1` text here.
pub fn aging_schema<'a>(tracked_columns: impl IntoIterator<Item = &'a str>) -> TableSchema {
    let mut schema = TableSchema::keyed(AGING_TABLE, AGING_SCHEMA_VERSION);
    for name in tracked_columns {
        if is_tracked_column(name) {
            schema.push(ColumnDef::text(name));
        }
    }
    schema.push(ColumnDef::text(col::LAST_UPDATE));
    schema
}

/// True for columns the aging ledger snapshots and compares.
pub fn is_tracked_column(name: &str) -> bool {
    TRACKED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Quotes an SQL identifier (`"` doubled inside).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// =============================================================================
// Unit Tests
// =============================================================================
