//! Status command implementation
//!
//! This module implements the `status` command for listing recent runs of
//! an export.

use crate::adapters::database::create_state_storage;
use crate::config::load_config;
use crate::core::state::RunRecorder;
use crate::domain::ids::ExportId;
use crate::domain::run::{BatchExportRun, RunStatus};
use clap::Args;
use std::str::FromStr;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Export to list runs for; the configured export when omitted
    #[arg(long)]
    pub export_id: Option<String>,

    /// List runs of every export
    #[arg(long, conflicts_with = "export_id")]
    pub all: bool,

    /// Maximum number of runs to show
    #[arg(long, default_value_t = 20)]
    pub limit: i64,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking run status");

        println!("📊 Batch Export Runs");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(2);
            }
        };

        let export_id = match (&self.export_id, self.all) {
            (_, true) => None,
            (Some(raw), false) => match ExportId::from_str(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    println!("❌ {e}");
                    return Ok(2);
                }
            },
            (None, false) => Some(config.batch_export.export_id),
        };

        let (store, _audit) = match create_state_storage(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to connect to database");
                println!("   Error: {}", e);
                return Ok(4);
            }
        };

        let recorder = RunRecorder::new(store);
        let runs = match recorder.list(export_id.as_ref(), self.limit.max(1)).await {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Failed to load runs");
                println!("   Error: {}", e);
                return Ok(5);
            }
        };

        if runs.is_empty() {
            println!("No runs found.");
            println!("Run 'harbor run' to start exporting data.");
            return Ok(0);
        }

        println!("Found {} run(s):", runs.len());
        println!();
        println!(
            "{:<38} {:<22} {:<22} {:<14} {:<40}",
            "Run ID", "Interval Start", "Interval End", "Status", "Latest Error"
        );
        println!("{}", "-".repeat(136));

        for run in &runs {
            println!("{}", format_run_row(run));
        }

        println!();
        Ok(0)
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Starting => "⏸️  Starting",
        RunStatus::Running => "🔄 Running",
        RunStatus::Completed => "✅ Completed",
        RunStatus::Failed => "❌ Failed",
    }
}

fn format_run_row(run: &BatchExportRun) -> String {
    let mut error = run.latest_error.clone().unwrap_or_default();
    if error.chars().count() > 40 {
        error = error.chars().take(37).collect::<String>() + "...";
    }
    format!(
        "{:<38} {:<22} {:<22} {:<14} {:<40}",
        run.id,
        run.data_interval_start.format("%Y-%m-%d %H:%M:%S"),
        run.data_interval_end.format("%Y-%m-%d %H:%M:%S"),
        status_label(run.status),
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{RunId, TeamId};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn test_format_run_row_truncates_error() {
        let mut run = BatchExportRun::starting(
            RunId::generate(),
            TeamId::new(1).unwrap(),
            ExportId::new(Uuid::new_v4()),
            Utc.with_ymd_and_hms(2023, 4, 20, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 4, 20, 15, 0, 0).unwrap(),
        );
        run.apply_status(RunStatus::Failed, Some(&"x".repeat(100)))
            .unwrap();

        let row = format_run_row(&run);
        assert!(row.contains("2023-04-20 14:00:00"));
        assert!(row.contains("❌ Failed"));
        assert!(row.contains(&format!("{}...", "x".repeat(37))));
        assert!(!row.contains(&"x".repeat(38)));
    }
}
