//! # Runner Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Command line flags (highest priority)                              │
//! │     --db ./recon.db --timezone America/Denver                          │
//! │                                                                         │
//! │  2. Environment Variables                                              │
//! │     RECON_DB_PATH, RECON_STATUS_PATH, RECON_TIMEZONE                   │
//! │                                                                         │
//! │  3. TOML Config File (--config or RECON_CONFIG)                        │
//! │     ~/.config/recon/recon.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.linerecon.recon/recon.toml       │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                   │
//! │     store and status file in the platform data directory, Pacific time │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # recon.toml
//! database_path = "/var/lib/linerecon/recon.db"
//! status_path = "/var/lib/linerecon/run_status.json"
//! timezone = "America/Los_Angeles"
//!
//! [recon]
//! gwp_sku_prefixes = ["ALOGWP", "LOYALTY"]
//! aging_view_threshold_hours = 12
//!
//! [recon.location]
//! placeholder = "Alo Distribution Centers"
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use directories::ProjectDirs;
use linerecon_core::ReconConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

const DATABASE_FILE: &str = "recon.db";
const STATUS_FILE: &str = "run_status.json";
const CONFIG_FILE: &str = "recon.toml";

/// Pacific time, daylight saving included.
const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

/// Everything a run needs to know, assembled once in `main`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// SQLite store. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Run-status artifact. Defaults to the platform data directory.
    #[serde(default)]
    pub status_path: Option<PathBuf>,

    /// IANA name of the reference timezone `created_at` and `last_update`
    /// are written in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Business rules handed to every stage.
    #[serde(default)]
    pub recon: ReconConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            database_path: None,
            status_path: None,
            timezone: default_timezone(),
            recon: ReconConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else the platform config dir)
    /// 3. Environment variables
    ///
    /// A missing config file is not an error; an unreadable one is.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(path = %path.display(), "Loading recon config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(path = %path.display(), "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads one TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `RECON_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(path) = lookup("RECON_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("RECON_STATUS_PATH") {
            self.status_path = Some(PathBuf::from(path));
        }

        if let Some(name) = lookup("RECON_TIMEZONE") {
            debug!(timezone = %name, "Overriding timezone from environment");
            self.timezone = name.trim().to_string();
        }

        Ok(())
    }

    /// Checks ranges that serde cannot.
    pub fn validate(&self) -> ConfigResult<()> {
        self.tz()?;

        if self.recon.aging_view_threshold_hours < 0 {
            return Err(ConfigError::Invalid(
                "aging_view_threshold_hours must not be negative".into(),
            ));
        }

        let location = &self.recon.location;
        if location.placeholder.trim().is_empty() || location.unknown_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "location placeholder and unknown_label must not be blank".into(),
            ));
        }

        Ok(())
    }

    /// The reference timezone.
    pub fn tz(&self) -> ConfigResult<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone))
        })
    }

    /// `instant` as wall-clock time in the reference timezone, with the
    /// offset in force at that instant.
    pub fn localize(&self, instant: DateTime<Utc>) -> ConfigResult<DateTime<FixedOffset>> {
        Ok(instant.with_timezone(&self.tz()?).fixed_offset())
    }

    /// Current time in the reference timezone.
    pub fn now(&self) -> ConfigResult<DateTime<FixedOffset>> {
        self.localize(Utc::now())
    }

    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Self::data_file(DATABASE_FILE),
        }
    }

    pub fn status_path(&self) -> ConfigResult<PathBuf> {
        match &self.status_path {
            Some(path) => Ok(path.clone()),
            None => Self::data_file(STATUS_FILE),
        }
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "linerecon", "recon")
    }

    fn data_file(name: &str) -> ConfigResult<PathBuf> {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join(name))
            .ok_or(ConfigError::NoDataDir)
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }
}
