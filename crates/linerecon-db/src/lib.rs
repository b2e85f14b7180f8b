//! # linerecon-db: Store Layer for Line Recon
//!
//! This crate provides access to the SQLite recon store: the source tables
//! the ingestion collaborators fill, and the three tables the pipeline owns.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Line Recon Data Flow                             │
//! │                                                                         │
//! │  recon-runner stage (normalize / merge / aging)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   linerecon-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │              │  │   │
//! │  │   │               │    │ Source        │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ Normalized    │    │ + additive   │  │   │
//! │  │   │ Connection    │    │ Merged        │    │   ALTER TABLE│  │   │
//! │  │   │ Management    │    │ Aging, Schema │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/linerecon/recon.db (default)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded migrations and the additive schema step
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linerecon_db::{Database, DbConfig};
//! use linerecon_core::Source;
//!
//! let db = Database::new(DbConfig::new("recon.db")).await?;
//! let shop = db.sources().snapshot(Source::Storefront).await?;
//! let merged = db.merged().list().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::{ensure_table_schema, SchemaChange};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::aging::AgingRepository;
pub use repository::merged::MergedRepository;
pub use repository::normalized::NormalizedRepository;
pub use repository::schema::{SchemaRecord, SchemaRegistryRepository};
pub use repository::source::SourceRepository;
