//! # Discrepancy Views
//!
//! Named filters over `merged_records` used by the reporting side. Every
//! view leaves gift-with-purchase lines out.
//!
//! | View                | Keeps lines that...                                     |
//! |---------------------|---------------------------------------------------------|
//! | `open-lines`        | are open in the storefront                              |
//! | `discrepancies`     | are not matched in both OMS and ERP                     |
//! | `erp-discrepancies` | have no ERP match but an OMS fulfillment id             |
//! | `oms-discrepancies` | have no OMS match but an OMS fulfillment id             |
//! | `aging-all`         | were ordered before the aging threshold                 |
//! | `backorders`        | are aged and ERP says `Backorder`                       |
//! | `ready-to-ship`     | are aged and ERP says `Ready`                           |
//! | `aging-missing-oms` | are aged and have no OMS order number                   |
//! | `aging-erp`         | are aged, have an OMS order number, ERP neither of above|

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::classify::erp_status;
use crate::error::{CoreError, ValidationError};
use crate::schema::col;
use crate::types::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscrepancyView {
    OpenLines,
    Discrepancies,
    ErpDiscrepancies,
    OmsDiscrepancies,
    AgingAll,
    Backorders,
    ReadyToShip,
    AgingMissingOms,
    AgingErp,
}

impl DiscrepancyView {
    pub const ALL: [DiscrepancyView; 9] = [
        DiscrepancyView::OpenLines,
        DiscrepancyView::Discrepancies,
        DiscrepancyView::ErpDiscrepancies,
        DiscrepancyView::OmsDiscrepancies,
        DiscrepancyView::AgingAll,
        DiscrepancyView::Backorders,
        DiscrepancyView::ReadyToShip,
        DiscrepancyView::AgingMissingOms,
        DiscrepancyView::AgingErp,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            DiscrepancyView::OpenLines => "open-lines",
            DiscrepancyView::Discrepancies => "discrepancies",
            DiscrepancyView::ErpDiscrepancies => "erp-discrepancies",
            DiscrepancyView::OmsDiscrepancies => "oms-discrepancies",
            DiscrepancyView::AgingAll => "aging-all",
            DiscrepancyView::Backorders => "backorders",
            DiscrepancyView::ReadyToShip => "ready-to-ship",
            DiscrepancyView::AgingMissingOms => "aging-missing-oms",
            DiscrepancyView::AgingErp => "aging-erp",
        }
    }

    /// True when `row` belongs in this view.
    ///
    /// Lines ordered before `now - threshold` count as aged; a storefront
    /// timestamp that does not parse never does.
    pub fn matches(&self, row: &Row, now: DateTime<FixedOffset>, threshold: Duration) -> bool {
        if row.flag(col::SHOP_IS_GWP_LINE) {
            return false;
        }

        let aged = || {
            row.text(col::SHOP_CREATED_AT)
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|created| created < now - threshold)
                .unwrap_or(false)
        };
        let status = row.text(col::ERP_WAREHOUSE_STATUS);
        let has_fulfillment = row.is_present(col::OMS_FULFILLMENT_ID);
        let has_oms_order = row.is_present(col::SHOP_OMS_ORDER_NUMBER);

        match self {
            DiscrepancyView::OpenLines => true,
            DiscrepancyView::Discrepancies => !row.flag(col::MATCH_ALL),
            DiscrepancyView::ErpDiscrepancies => !row.flag(col::MATCH_ERP) && has_fulfillment,
            DiscrepancyView::OmsDiscrepancies => !row.flag(col::MATCH_OMS) && has_fulfillment,
            DiscrepancyView::AgingAll => aged(),
            DiscrepancyView::Backorders => aged() && status == Some(erp_status::BACKORDER),
            DiscrepancyView::ReadyToShip => aged() && status == Some(erp_status::READY),
            DiscrepancyView::AgingMissingOms => aged() && !has_oms_order,
            DiscrepancyView::AgingErp => {
                aged()
                    && has_oms_order
                    && status != Some(erp_status::BACKORDER)
                    && status != Some(erp_status::READY)
            }
        }
    }

    /// Rows of `rows` that belong in this view, in input order.
    pub fn filter<'a>(
        &self,
        rows: &'a [Row],
        now: DateTime<FixedOffset>,
        threshold: Duration,
    ) -> Vec<&'a Row> {
        rows.iter()
            .filter(|row| self.matches(row, now, threshold))
            .collect()
    }
}

impl fmt::Display for DiscrepancyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DiscrepancyView {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        DiscrepancyView::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| {
                ValidationError::InvalidFormat {
                    field: "view".to_string(),
                    reason: format!(
                        "unknown view '{}'. Valid options: {}",
                        s,
                        DiscrepancyView::ALL.map(|v| v.name()).join(", ")
                    ),
                }
                .into()
            })
    }
}
