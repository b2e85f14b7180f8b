//! # Recon Configuration
//!
//! Business rules the stages need, passed in explicitly as a value.
//!
//! ## Configuration File Format
//! The runner embeds this under `[recon]` in its TOML file:
//! ```toml
//! [recon]
//! gwp_sku_prefixes = ["ALOGWP", "LOYALTY"]
//! aging_view_threshold_hours = 12
//!
//! [recon.location]
//! placeholder = "Alo Distribution Centers"
//! numeric_prefix = "AYS"
//! unknown_label = "UNKNOWN"
//! unknown_aliases = ["N/A"]
//! ```
//!
//! Every field has a default, so an empty `[recon]` table (or none at all)
//! yields [`ReconConfig::default()`].

use serde::{Deserialize, Serialize};

// =============================================================================
// Location Rules
// =============================================================================

/// How raw location strings are folded into one warehouse-code namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRules {
    /// Storefront "assigned location" meaning "some distribution center".
    /// When a line carries it, the OMS-reported location wins.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Alphabetic prefix that replaces numeric location prefixes.
    #[serde(default = "default_numeric_prefix")]
    pub numeric_prefix: String,

    /// Code used for absent or unrecognized locations.
    #[serde(default = "default_unknown_label")]
    pub unknown_label: String,

    /// Raw values that mean "no location" (compared case-insensitively).
    #[serde(default = "default_unknown_aliases")]
    pub unknown_aliases: Vec<String>,
}

fn default_placeholder() -> String {
    "Alo Distribution Centers".to_string()
}

fn default_numeric_prefix() -> String {
    "AYS".to_string()
}

fn default_unknown_label() -> String {
    "UNKNOWN".to_string()
}

fn default_unknown_aliases() -> Vec<String> {
    vec!["N/A".to_string()]
}

impl Default for LocationRules {
    fn default() -> Self {
        LocationRules {
            placeholder: default_placeholder(),
            numeric_prefix: default_numeric_prefix(),
            unknown_label: default_unknown_label(),
            unknown_aliases: default_unknown_aliases(),
        }
    }
}

// =============================================================================
// Recon Config
// =============================================================================

/// Configuration for the reconciliation stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub location: LocationRules,

    /// SKU prefixes of gift-with-purchase and loyalty-reward lines.
    #[serde(default = "default_gwp_sku_prefixes")]
    pub gwp_sku_prefixes: Vec<String>,

    /// Storefront lines older than this show up in the aging views.
    #[serde(default = "default_aging_view_threshold_hours")]
    pub aging_view_threshold_hours: i64,
}

fn default_gwp_sku_prefixes() -> Vec<String> {
    vec!["ALOGWP".to_string(), "LOYALTY".to_string()]
}

fn default_aging_view_threshold_hours() -> i64 {
    12
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            location: LocationRules::default(),
            gwp_sku_prefixes: default_gwp_sku_prefixes(),
            aging_view_threshold_hours: default_aging_view_threshold_hours(),
        }
    }
}

impl ReconConfig {
    /// True when `sku` belongs to a gift-with-purchase or loyalty line.
    pub fn is_gwp_sku(&self, sku: &str) -> bool {
        let sku = sku.trim();
        self.gwp_sku_prefixes
            .iter()
            .any(|p| !p.is_empty() && sku.starts_with(p.as_str()))
    }

    /// The aging view threshold as a duration.
    pub fn aging_view_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(self.aging_view_threshold_hours)
    }
}
