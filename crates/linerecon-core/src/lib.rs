//! # linerecon-core: Pure Reconciliation Logic
//!
//! This crate holds the reconciliation logic for order lines that live in
//! three systems of record: the storefront, the OMS and the warehouse ERP.
//! Every stage is a pure function over snapshots.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Line Recon Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 recon-runner (orchestrator)                     │   │
//! │  │   Normalize ──► Merge ──► Classify ──► Aging   + status file    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ linerecon-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ location │ │  merge   │ │ classify │ │  aging   │          │   │
//! │  │   │ codes    │ │ join +   │ │ decision │ │ change-  │          │   │
//! │  │   │ rebuild  │ │ upserts  │ │ list     │ │ detected │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • SNAPSHOTS IN, PLANS OUT    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 linerecon-db (Store Layer)                      │   │
//! │  │       SQLite pool, migrations, plan application, queries        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Rows, sources, line keys
//! - [`schema`] - Versioned table definitions and column names
//! - [`location`] - Location normalizer
//! - [`merge`] - Three-way merge planner
//! - [`classify`] - Recon state decision list
//! - [`aging`] - Aging ledger planner
//! - [`views`] - Discrepancy filters for reporting
//! - [`config`] - Business rules passed into each stage
//! - [`error`] / [`validation`] - Error types and identifier checks
//!
//! ## Example Usage
//!
//! ```rust
//! use linerecon_core::classify::{classify, ReconFacts, ReconState};
//!
//! let facts = ReconFacts {
//!     match_oms: true,
//!     match_erp: true,
//!     erp_status: Some("Ready".to_string()),
//!     ..ReconFacts::default()
//! };
//! assert_eq!(classify(&facts), ReconState::InstorePickup);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aging;
pub mod classify;
pub mod config;
pub mod error;
pub mod location;
pub mod merge;
pub mod schema;
pub mod types;
pub mod validation;
pub mod views;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use aging::{AgingEntry, AgingPlan, AgingSummary};
pub use classify::{classify, ReconFacts, ReconState, StateTally};
pub use config::{LocationRules, ReconConfig};
pub use error::{CoreError, CoreResult, ValidationError};
pub use location::{normalize_lines, NormalizedLine, Normalization};
pub use merge::{plan_merge, MergePlan, MergeSummary, MergedRecord};
pub use schema::TableSchema;
pub use types::*;
pub use views::DiscrepancyView;
