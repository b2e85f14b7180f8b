//! # recon-runner: Batch Pipeline Orchestrator
//!
//! Loads configuration, runs the recon stages in order against the SQLite
//! store and records the outcome in the run-status artifact.
//!
//! ## Module Organization
//!
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`pipeline`] - Stage entry points and the full run
//! - [`status`] - Run-status artifact
//! - [`report`] - Views and aging report over the committed store
//! - [`error`] - Runner error types

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod status;

pub use config::RunnerConfig;
pub use error::{ConfigError, PipelineError, RunnerError, StageError, StatusError};
pub use pipeline::{RunReport, Stage};
pub use status::{run_recorded, RunState, RunStatus, StatusFile};
