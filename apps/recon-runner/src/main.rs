//! # recon-runner
//!
//! ```text
//! recon-runner run                       Normalize → Merge → Classify → Aging
//! recon-runner report [--view <name>]    State tally, or one discrepancy view
//! recon-runner aging                     Aging ledger with ages
//! recon-runner status                    Last run-status artifact
//! ```
//!
//! Reports are printed as JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linerecon_core::DiscrepancyView;
use linerecon_db::{Database, DbConfig};
use recon_runner::{pipeline, report, run_recorded, RunnerConfig, RunnerError, StatusFile};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recon-runner")]
#[command(about = "Order-line reconciliation across storefront, OMS and ERP")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, env = "RECON_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite store (overrides RECON_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Run-status artifact (overrides RECON_STATUS_PATH)
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,

    /// Reference IANA timezone (overrides RECON_TIMEZONE)
    #[arg(long, global = true)]
    timezone: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every stage and record the outcome
    Run,

    /// Print the recon state tally, or the lines of one view
    Report {
        /// open-lines, discrepancies, erp-discrepancies, oms-discrepancies,
        /// aging-all, backorders, ready-to-ship, aging-missing-oms, aging-erp
        #[arg(long)]
        view: Option<DiscrepancyView>,
    },

    /// Print the aging ledger, oldest first
    Aging,

    /// Print the last run-status artifact
    Status,
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` replaces the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,linerecon=debug,recon_runner=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<RunnerConfig> {
    let mut config = RunnerConfig::load(cli.config.clone()).context("Failed to load configuration")?;

    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }
    if let Some(status) = &cli.status_file {
        config.status_path = Some(status.clone());
    }
    if let Some(timezone) = &cli.timezone {
        config.timezone = timezone.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn open_store(config: &RunnerConfig) -> Result<Database> {
    let path = config.database_path()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    Database::new(DbConfig::new(&path))
        .await
        .with_context(|| format!("Failed to open store at {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let status_file = StatusFile::new(config.status_path()?);

    match cli.command {
        Command::Run => {
            let db = open_store(&config).await?;
            let outcome = run_recorded(&db, &config, &status_file).await;
            db.close().await;

            match outcome {
                Ok(report) => {
                    print_json(&report)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(RunnerError::Pipeline(err)) => {
                    error!(stage = %err.stage, error = %err.chain(), "Recon run failed");
                    Ok(ExitCode::FAILURE)
                }
                Err(err) => Err(err.into()),
            }
        }

        Command::Report { view } => {
            let db = open_store(&config).await?;
            match view {
                Some(view) => {
                    let rows = report::view(&db, &config.recon, view, config.now()?).await?;
                    print_json(&rows)?;
                }
                None => {
                    let states = pipeline::classify(&db, &config.recon).await?;
                    print_json(&states)?;
                }
            }
            db.close().await;
            Ok(ExitCode::SUCCESS)
        }

        Command::Aging => {
            let db = open_store(&config).await?;
            let entries = report::aging(&db, config.now()?).await?;
            info!(entries = entries.len(), "Aging ledger read");
            print_json(&entries)?;
            db.close().await;
            Ok(ExitCode::SUCCESS)
        }

        Command::Status => match status_file.read()? {
            Some(status) => {
                print_json(&status)?;
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("No run recorded at {}", status_file.path().display());
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
