//! # Recon State Classifier
//!
//! Derives one [`ReconState`] per merged record from an ordered decision
//! list. Nothing here is persisted; states are recomputed whenever they are
//! read.
//!
//! ## Decision List
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  #  State                          Predicate (all must hold)            │
//! │  ─  ─────────────────────────────  ───────────────────────────────────  │
//! │  1  GoodPreorder                   oms ∧ erp ∧ Backorder ∧ no fulfil.   │
//! │                                    ∧ preorder = "preor"                 │
//! │  2  PreorderReleasedBackorder      oms ∧ erp ∧ fulfillment ∧ "preor"    │
//! │                                    ∧ Backorder                          │
//! │  3  CancelOrReroute                oms ∧ erp ∧ Backorder ∧ no preorder  │
//! │  4  InstorePickup                  status = Ready                       │
//! │  5  RunOEFinish                    no status ∧ erp                      │
//! │  6  XBReconRequired                Manifested ∧ erp ∧ oms ∧ loc = "AS"  │
//! │  7  NoOMSFulfillment               no status ∧ ¬erp ∧ ¬oms ∧ no preorder│
//! │                                    ∧ assigned = placeholder             │
//! │  8  ERPIssueRequiresInvestigation  ¬erp ∧ oms                           │
//! │  -  Unclassified                   nothing matched                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The predicates overlap (1 and 3 share `oms ∧ erp ∧ Backorder`, 4 and 5
//! both accept matched ERP lines), so the first matching rule wins and the
//! order of [`RULES`] must not change. Blank and whitespace-only values count
//! as absent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::LocationRules;
use crate::error::CoreError;
use crate::schema::col;
use crate::types::Row;

/// ERP warehouse statuses the rules test for.
pub mod erp_status {
    pub const BACKORDER: &str = "Backorder";
    pub const READY: &str = "Ready";
    pub const MANIFESTED: &str = "Manifested";
}

/// ERP preorder flag value of a preorder line.
pub const PREORDER: &str = "preor";

/// Canonical location of the cross-border warehouse.
pub const CROSS_BORDER_LOCATION: &str = "AS";

// =============================================================================
// Recon State
// =============================================================================

/// Reconciliation state of one merged line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReconState {
    GoodPreorder,
    PreorderReleasedBackorder,
    CancelOrReroute,
    InstorePickup,
    RunOEFinish,
    XBReconRequired,
    NoOMSFulfillment,
    ERPIssueRequiresInvestigation,
    Unclassified,
}

impl ReconState {
    /// Every state, in decision order, `Unclassified` last.
    pub const ALL: [ReconState; 9] = [
        ReconState::GoodPreorder,
        ReconState::PreorderReleasedBackorder,
        ReconState::CancelOrReroute,
        ReconState::InstorePickup,
        ReconState::RunOEFinish,
        ReconState::XBReconRequired,
        ReconState::NoOMSFulfillment,
        ReconState::ERPIssueRequiresInvestigation,
        ReconState::Unclassified,
    ];

    /// Label shown to fulfillment staff.
    pub const fn label(&self) -> &'static str {
        match self {
            ReconState::GoodPreorder => "Good Preorder",
            ReconState::PreorderReleasedBackorder => "Preorder Released Backorder",
            ReconState::CancelOrReroute => "Cancel or Reroute",
            ReconState::InstorePickup => "Instore Pickup",
            ReconState::RunOEFinish => "Run OE Finish",
            ReconState::XBReconRequired => "XB Recon Required",
            ReconState::NoOMSFulfillment => "No OMS Fulfillment",
            ReconState::ERPIssueRequiresInvestigation => "ERP Issue Requires Invest.",
            ReconState::Unclassified => "Unclassified",
        }
    }

    /// Identifier form (`GoodPreorder`, ...).
    pub const fn name(&self) -> &'static str {
        match self {
            ReconState::GoodPreorder => "GoodPreorder",
            ReconState::PreorderReleasedBackorder => "PreorderReleasedBackorder",
            ReconState::CancelOrReroute => "CancelOrReroute",
            ReconState::InstorePickup => "InstorePickup",
            ReconState::RunOEFinish => "RunOEFinish",
            ReconState::XBReconRequired => "XBReconRequired",
            ReconState::NoOMSFulfillment => "NoOMSFulfillment",
            ReconState::ERPIssueRequiresInvestigation => "ERPIssueRequiresInvestigation",
            ReconState::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for ReconState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ReconState {
    type Err = CoreError;

    /// Accepts the identifier or the label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ReconState::ALL
            .into_iter()
            .find(|state| state.name() == s || state.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::malformed("recon_state", format!("unknown state '{}'", s)))
    }
}

// =============================================================================
// Facts
// =============================================================================

/// The fields of a merged record the rules look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconFacts {
    pub match_oms: bool,
    pub match_erp: bool,
    pub erp_status: Option<String>,
    pub oms_fulfillment_id: Option<String>,
    pub preorder_flag: Option<String>,
    pub normalized_location: Option<String>,
    /// Storefront assigned location is the distribution-center placeholder.
    pub assigned_to_placeholder: bool,
    pub is_gwp_line: bool,
}

impl ReconFacts {
    /// Reads the facts from a `merged_records` row.
    pub fn from_row(row: &Row, rules: &LocationRules) -> Self {
        let text = |column: &str| row.text(column).map(str::to_string);
        ReconFacts {
            match_oms: row.flag(col::MATCH_OMS),
            match_erp: row.flag(col::MATCH_ERP),
            erp_status: text(col::ERP_WAREHOUSE_STATUS),
            oms_fulfillment_id: text(col::OMS_FULFILLMENT_ID),
            preorder_flag: text(col::SHOP_PREORDER_FLAG),
            normalized_location: text(col::SHOP_NORMALIZED_LOCATION),
            assigned_to_placeholder: rules.is_placeholder(row.get(col::SHOP_ASSIGNED_LOCATION)),
            is_gwp_line: row.flag(col::SHOP_IS_GWP_LINE),
        }
    }

    fn status_is(&self, status: &str) -> bool {
        self.erp_status.as_deref() == Some(status)
    }

    fn is_preorder(&self) -> bool {
        self.preorder_flag.as_deref() == Some(PREORDER)
    }
}

// =============================================================================
// Rules
// =============================================================================

/// One entry of the decision list.
#[derive(Clone, Copy)]
pub struct Rule {
    pub state: ReconState,
    pub applies: fn(&ReconFacts) -> bool,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("state", &self.state).finish()
    }
}

/// The decision list, highest priority first.
pub static RULES: [Rule; 8] = [
    Rule {
        state: ReconState::GoodPreorder,
        applies: |f| {
            f.match_oms
                && f.match_erp
                && f.status_is(erp_status::BACKORDER)
                && f.oms_fulfillment_id.is_none()
                && f.is_preorder()
        },
    },
    Rule {
        state: ReconState::PreorderReleasedBackorder,
        applies: |f| {
            f.match_oms
                && f.match_erp
                && f.oms_fulfillment_id.is_some()
                && f.is_preorder()
                && f.status_is(erp_status::BACKORDER)
        },
    },
    Rule {
        state: ReconState::CancelOrReroute,
        applies: |f| {
            f.match_oms
                && f.match_erp
                && f.status_is(erp_status::BACKORDER)
                && f.preorder_flag.is_none()
        },
    },
    Rule {
        state: ReconState::InstorePickup,
        applies: |f| f.status_is(erp_status::READY),
    },
    Rule {
        state: ReconState::RunOEFinish,
        applies: |f| f.erp_status.is_none() && f.match_erp,
    },
    Rule {
        state: ReconState::XBReconRequired,
        applies: |f| {
            f.status_is(erp_status::MANIFESTED)
                && f.match_erp
                && f.match_oms
                && f.normalized_location.as_deref() == Some(CROSS_BORDER_LOCATION)
        },
    },
    Rule {
        state: ReconState::NoOMSFulfillment,
        applies: |f| {
            f.erp_status.is_none()
                && !f.match_erp
                && !f.match_oms
                && f.preorder_flag.is_none()
                && f.assigned_to_placeholder
        },
    },
    Rule {
        state: ReconState::ERPIssueRequiresInvestigation,
        applies: |f| !f.match_erp && f.match_oms,
    },
];

/// The decision list in evaluation order.
pub fn rules() -> &'static [Rule] {
    &RULES
}

/// First state whose rule holds, or `Unclassified`.
pub fn classify(facts: &ReconFacts) -> ReconState {
    RULES
        .iter()
        .find(|rule| (rule.applies)(facts))
        .map(|rule| rule.state)
        .unwrap_or(ReconState::Unclassified)
}

// =============================================================================
// State Tally
// =============================================================================

/// Number of lines in one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StateCount {
    pub state: ReconState,
    pub label: String,
    pub count: usize,
}

/// Lines per state across `merged_records`, GWP lines excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StateTally {
    pub total: usize,
    pub gwp_excluded: usize,
    /// One entry per state, in decision order.
    pub counts: Vec<StateCount>,
}

impl StateTally {
    pub fn count(&self, state: ReconState) -> usize {
        self.counts
            .iter()
            .find(|c| c.state == state)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

/// Classifies every row and counts the results.
pub fn tally<'a>(rows: impl IntoIterator<Item = &'a Row>, rules: &LocationRules) -> StateTally {
    let mut counts = [0usize; ReconState::ALL.len()];
    let mut total = 0;
    let mut gwp_excluded = 0;

    for row in rows {
        let facts = ReconFacts::from_row(row, rules);
        if facts.is_gwp_line {
            gwp_excluded += 1;
            continue;
        }
        let state = classify(&facts);
        if let Some(slot) = ReconState::ALL.iter().position(|s| *s == state) {
            counts[slot] += 1;
        }
        total += 1;
    }

    StateTally {
        total,
        gwp_excluded,
        counts: ReconState::ALL
            .iter()
            .zip(counts)
            .map(|(state, count)| StateCount {
                state: *state,
                label: state.label().to_string(),
                count,
            })
            .collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
