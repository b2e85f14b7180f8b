//! # Runner Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Runner Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  ConfigError    │  │  StageError     │  │  StatusError            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Io, Parse      │  │  Db (DbError)   │  │  Io, Json               │ │
//! │  │  Invalid        │  │  Core           │  │                         │ │
//! │  │  NoDataDir      │  │                 │  │                         │ │
//! │  └─────────────────┘  └────────┬────────┘  └─────────────────────────┘ │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                   PipelineError { stage, source }                       │
//! │                   recorded in the run-status artifact                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::error::Error as _;
use std::path::PathBuf;

use linerecon_core::CoreError;
use linerecon_db::DbError;
use thiserror::Error;

use crate::pipeline::Stage;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Failure to assemble a [`crate::config::RunnerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range (file, environment or flag).
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// No path was configured and the platform has no data directory.
    #[error("Could not determine the data directory; set RECON_DB_PATH")]
    NoDataDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Stage Errors
// =============================================================================

/// What went wrong inside one stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// A stage failed; the stages after it did not run.
///
/// State committed by earlier stages stays in the store.
#[derive(Debug, Error)]
#[error("Stage {stage} failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        PipelineError {
            stage,
            source: source.into(),
        }
    }

    /// The error and every cause below it, outermost first.
    pub fn chain(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut cause = self.source();
        while let Some(err) = cause {
            parts.push(err.to_string());
            cause = err.source();
        }
        parts.join(": ")
    }

    /// True when the stage failed because a source table was missing or empty.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self.source,
            StageError::Db(DbError::SourceUnavailable { .. })
        )
    }
}

// =============================================================================
// Status Artifact Errors
// =============================================================================

/// Failure to read or write the run-status file.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Status file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Status file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Runner Errors
// =============================================================================

/// Anything that stops a recorded run.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
