//! Thin CLI wiring over the library (spec §1 names the CLI/TUI surface as an
//! external collaborator; `SPEC_FULL.md` §12 supplements it with a minimal
//! runnable entry point in the teacher's own `clap` `Parser`/`Subcommand`
//! style). All algorithmic content lives in the library; this module only
//! parses arguments, calls a service, and prints JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::import::ImportDescription;
use crate::pipeline::WhatNowRequest;
use crate::replan::{ReplanRequest, ReplanTrigger};
use crate::session::LogSessionRequest;
use crate::status::StatusRequest;
use crate::KairosApp;

#[derive(Parser)]
#[command(name = "kairos")]
#[command(about = "Deterministic planning engine for scheduling knowledge work")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recommend work items and minute allocations for the time you have right now.
    WhatNow {
        #[arg(long)]
        available_min: u32,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Falls back to `KAIROS_DEFAULT_MAX_SLICES` (see `Config`) when omitted.
        #[arg(long)]
        max_slices: Option<usize>,
        #[arg(long, default_value_t = false)]
        include_archived: bool,
        #[arg(long = "project")]
        project_scope: Vec<Uuid>,
        #[arg(long, default_value_t = true)]
        enforce_variation: bool,
    },

    /// Report per-project risk and a global summary.
    Status {
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = false)]
        include_archived: bool,
        #[arg(long = "project")]
        project_scope: Vec<Uuid>,
        #[arg(long, default_value_t = 7)]
        include_recent_session_days: i64,
    },

    /// Re-estimate effort across every active project until convergence.
    Replan {
        #[arg(long, default_value = "manual")]
        trigger: ReplanTriggerArg,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// Log a work session against a work item.
    LogSession {
        #[arg(long)]
        work_item: Uuid,
        #[arg(long)]
        started_at: DateTime<Utc>,
        #[arg(long)]
        minutes: u32,
        #[arg(long)]
        units_delta: Option<i64>,
    },

    /// Atomically import a project description from a YAML file.
    Import {
        /// Path to a YAML file matching the import file schema (spec §6).
        path: String,
    },

    /// Produce a deterministic explanation of a previously-saved response.
    Explain {
        #[arg(long = "from")]
        from: ExplainSource,
        /// Path to a JSON file containing a saved `WhatNowResponse` or
        /// `ReplanResponse`.
        path: String,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReplanTriggerArg {
    Manual,
    Automatic,
}

impl From<ReplanTriggerArg> for ReplanTrigger {
    fn from(value: ReplanTriggerArg) -> Self {
        match value {
            ReplanTriggerArg::Manual => ReplanTrigger::Manual,
            ReplanTriggerArg::Automatic => ReplanTrigger::Automatic,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ExplainSource {
    WhatNow,
    Replan,
}

pub async fn run(cli: Cli, app: &KairosApp, config: &Config) -> Result<()> {
    match cli.command {
        Commands::WhatNow {
            available_min,
            now,
            max_slices,
            include_archived,
            project_scope,
            enforce_variation,
        } => {
            let request = WhatNowRequest {
                available_min,
                now,
                max_slices: max_slices.unwrap_or(config.default_max_slices),
                include_archived,
                project_scope,
                enforce_variation,
            };
            let response = app
                .what_now_service()
                .recommend(&request, None)
                .await
                .context("what-now recommendation failed")?;
            print_json(&response)
        }
        Commands::Status {
            now,
            include_archived,
            project_scope,
            include_recent_session_days,
        } => {
            let request = StatusRequest {
                now,
                include_archived,
                project_scope,
                include_recent_session_days,
            };
            let response = app
                .status_service()
                .status(&request)
                .await
                .context("status failed")?;
            print_json(&response)
        }
        Commands::Replan { trigger, now } => {
            let request = ReplanRequest {
                trigger: trigger.into(),
                now,
            };
            let response = app
                .replan_service()
                .replan(&request)
                .await
                .context("replan failed")?;
            print_json(&response)
        }
        Commands::LogSession {
            work_item,
            started_at,
            minutes,
            units_delta,
        } => {
            let request = LogSessionRequest {
                work_item_id: work_item,
                started_at,
                duration_min: minutes,
                units_delta,
                now: None,
            };
            let response = app
                .session_service()
                .log_session(&request)
                .await
                .context("log-session failed")?;
            print_json(&response)
        }
        Commands::Import { path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading import file '{path}'"))?;
            let description: ImportDescription = serde_yaml::from_str(&raw)
                .with_context(|| format!("parsing import file '{path}' as YAML"))?;
            let response = app
                .import_service()
                .import(description, Utc::now())
                .await
                .context("import failed")?;
            print_json(&response)
        }
        Commands::Explain { from, path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading response file '{path}'"))?;
            let explanation = match from {
                ExplainSource::WhatNow => {
                    let response = serde_json::from_str(&raw)
                        .with_context(|| format!("parsing '{path}' as a what-now response"))?;
                    crate::explain::explain_what_now(&response)
                }
                ExplainSource::Replan => {
                    let response = serde_json::from_str(&raw)
                        .with_context(|| format!("parsing '{path}' as a replan response"))?;
                    crate::explain::explain_replan(&response)
                }
            };
            print_json(&explanation)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing response to JSON")?;
    println!("{text}");
    Ok(())
}
