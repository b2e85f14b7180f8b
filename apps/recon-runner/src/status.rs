//! # Run-Status Artifact
//!
//! A small JSON file the monitoring side polls:
//!
//! ```json
//! {
//!   "run_id": "6f1c…",
//!   "status": "failed",
//!   "start_time": "2026-03-02T09:00:00-08:00",
//!   "end_time": "2026-03-02T09:00:04-08:00",
//!   "failed_stage": "merge",
//!   "error": "Stage merge failed: Query failed: …"
//! }
//! ```
//!
//! Written once when a run starts (`running`) and once when it ends
//! (`complete` or `failed`). Each write replaces the whole file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use linerecon_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::{PipelineError, RunnerError, StatusError};
use crate::pipeline::{self, RunReport, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RunState {
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RunStatus {
    pub run_id: String,
    pub status: RunState,
    /// RFC 3339, reference offset.
    pub start_time: String,
    pub end_time: Option<String>,
    pub failed_stage: Option<Stage>,
    /// Full error chain of the failed stage.
    pub error: Option<String>,
}

impl RunStatus {
    pub fn started(run_id: Uuid, now: DateTime<FixedOffset>) -> Self {
        RunStatus {
            run_id: run_id.to_string(),
            status: RunState::Running,
            start_time: now.to_rfc3339(),
            end_time: None,
            failed_stage: None,
            error: None,
        }
    }

    pub fn complete(self, now: DateTime<FixedOffset>) -> Self {
        RunStatus {
            status: RunState::Complete,
            end_time: Some(now.to_rfc3339()),
            ..self
        }
    }

    pub fn failed(self, now: DateTime<FixedOffset>, err: &PipelineError) -> Self {
        RunStatus {
            status: RunState::Failed,
            end_time: Some(now.to_rfc3339()),
            failed_stage: Some(err.stage),
            error: Some(err.chain()),
            ..self
        }
    }
}

/// Location of the artifact.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StatusFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StatusError {
        StatusError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Replaces the artifact. Written to a sibling file first and renamed,
    /// so a reader never sees half a document.
    pub fn write(&self, status: &RunStatus) -> Result<(), StatusError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(status)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// The last artifact, or `None` if no run was ever recorded.
    pub fn read(&self) -> Result<Option<RunStatus>, StatusError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Runs the pipeline and records it in the status artifact.
///
/// A stage failure is written to the artifact before it is returned.
pub async fn run_recorded(
    db: &Database,
    config: &RunnerConfig,
    status_file: &StatusFile,
) -> Result<RunReport, RunnerError> {
    let run_id = Uuid::new_v4();
    let now = config.now()?;

    let status = RunStatus::started(run_id, now);
    status_file.write(&status)?;
    info!(%run_id, path = %status_file.path().display(), "Run started");

    match pipeline::run(db, &config.recon, now, run_id).await {
        Ok(report) => {
            status_file.write(&status.complete(config.now()?))?;
            info!(%run_id, "Run recorded as complete");
            Ok(report)
        }
        Err(err) => {
            status_file.write(&status.failed(config.now()?, &err))?;
            warn!(%run_id, stage = %err.stage, "Run recorded as failed");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linerecon_db::DbError;

    fn at(ts: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(ts).unwrap()
    }

    fn scratch(name: &str) -> StatusFile {
        let dir = std::env::temp_dir().join(format!("recon-status-{}", Uuid::new_v4()));
        StatusFile::new(dir.join(name))
    }

    #[test]
    fn test_failed_status_carries_stage_and_chain() {
        let err = PipelineError::new(
            Stage::Merge,
            DbError::QueryFailed("disk I/O error".into()),
        );
        let status = RunStatus::started(Uuid::nil(), at("2026-03-02T09:00:00-08:00"))
            .failed(at("2026-03-02T09:00:04-08:00"), &err);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failed_stage"], "merge");
        assert_eq!(json["start_time"], "2026-03-02T09:00:00-08:00");
        assert_eq!(json["end_time"], "2026-03-02T09:00:04-08:00");
        assert_eq!(json["error"], "Stage merge failed: Query failed: disk I/O error");
    }

    #[test]
    fn test_running_status_has_no_end() {
        let status = RunStatus::started(Uuid::nil(), at("2026-03-02T09:00:00-08:00"));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json["end_time"].is_null());
        assert!(json["failed_stage"].is_null());
    }

    #[test]
    fn test_write_then_read() {
        let file = scratch("run_status.json");
        assert_eq!(file.read().unwrap(), None);

        let status = RunStatus::started(Uuid::new_v4(), at("2026-03-02T09:00:00-08:00"))
            .complete(at("2026-03-02T09:01:00-08:00"));
        file.write(&status).unwrap();

        assert_eq!(file.read().unwrap(), Some(status));
    }
}
