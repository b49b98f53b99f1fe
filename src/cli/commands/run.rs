//! Run command implementation
//!
//! This module implements the `run` command, which executes one batch export
//! run for the configured export.

use crate::adapters::clickhouse::ClickHouseClient;
use crate::adapters::database::create_state_storage;
use crate::adapters::destination::DefaultConnector;
use crate::adapters::source::{EventQuery, EventSource};
use crate::config::{load_config, HarborConfig};
use crate::core::export::{ExportOptions, StreamingExporter};
use crate::core::interval::{resolve_data_interval, SchedulerValue};
use crate::core::state::RunRecorder;
use crate::core::workflow::{BatchExportInputs, WorkflowDriver, WorkflowPolicies};
use crate::domain::{ErrorKind, HarborError, Result};
use clap::Args;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// End of the data interval (RFC 3339 or `YYYY-MM-DD HH:MM:SS`, UTC)
    #[arg(long)]
    pub data_interval_end: Option<String>,

    /// Scheduled start time as handed over by the scheduler; JSON or plain text
    #[arg(long)]
    pub scheduled_start_time: Option<String>,

    /// Read the workflow inputs from a JSON file instead of the configuration
    #[arg(long, value_name = "FILE")]
    pub inputs: Option<String>,

    /// Resolve the interval and count rows without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        let inputs = match self.build_inputs(&config) {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::error!(error = %e, "Invalid workflow inputs");
                eprintln!("Invalid workflow inputs: {e}");
                return Ok(2);
            }
        };

        if self.dry_run {
            return Ok(Self::dry_run(&config, &inputs).await);
        }

        let driver = match build_driver(&config).await {
            Ok(d) => d.with_cancellation(shutdown_signal),
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize workflow");
                eprintln!("Failed to initialize workflow: {e}");
                return Ok(match exit_code(&e) {
                    2 => 2,
                    _ => 4,
                });
            }
        };

        println!("🚀 Starting batch export run...");
        let result = driver.run(inputs).await;

        let retention = chrono::Duration::days(config.audit.retention_days);
        if let Err(e) = driver.audit_sink().purge_expired(retention).await {
            tracing::warn!(error = %e, "Failed to purge expired audit records");
        }

        match result {
            Ok(outcome) => {
                println!();
                println!("📊 Run Summary:");
                println!("  Run ID: {}", outcome.run_id);
                println!("  Interval: {}", outcome.interval);
                println!("  Status: {}", outcome.status);
                println!("  Rows Exported: {}", outcome.summary.rows_exported);
                println!("  Chunks Staged: {}", outcome.summary.chunks_staged);
                println!("  Files Loaded: {}", outcome.summary.files_loaded);
                if outcome.summary.resumptions > 0 {
                    println!("  Stream Resumptions: {}", outcome.summary.resumptions);
                }
                println!(
                    "  Duration: {:.2}s",
                    outcome.summary.duration_ms as f64 / 1000.0
                );
                println!();
                println!("✅ Batch export run completed successfully!");
                Ok(0)
            }
            Err(e) => {
                let code = exit_code(&e);
                if code == 130 {
                    println!();
                    println!("⚠️  Run interrupted. The run was recorded as failed.");
                } else {
                    eprintln!("Batch export run failed: {e}");
                }
                Ok(code)
            }
        }
    }

    /// Workflow inputs from `--inputs` or the configuration, with CLI overrides
    fn build_inputs(&self, config: &HarborConfig) -> Result<BatchExportInputs> {
        let mut inputs = match &self.inputs {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    HarborError::Configuration(format!("Failed to read inputs file {path}: {e}"))
                })?;
                serde_json::from_str::<BatchExportInputs>(&contents).map_err(|e| {
                    HarborError::Validation(format!("Invalid inputs file {path}: {e}"))
                })?
            }
            None => BatchExportInputs::from_config(&config.batch_export),
        };

        if let Some(end) = &self.data_interval_end {
            inputs.data_interval_end = Some(end.clone());
        }
        if let Some(raw) = &self.scheduled_start_time {
            inputs.scheduled_start_time = Some(parse_scheduler_value(raw));
        }

        inputs
            .destination
            .validate()
            .map_err(HarborError::Validation)?;
        Ok(inputs)
    }

    async fn dry_run(config: &HarborConfig, inputs: &BatchExportInputs) -> i32 {
        tracing::info!("Dry run mode enabled - nothing will be written");
        println!("🔍 DRY RUN MODE - No run record or destination table will be written");
        println!();

        let interval = match resolve_data_interval(
            inputs.data_interval_end.as_deref(),
            inputs.scheduled_start_time.clone().map(SchedulerValue::from_json),
            inputs.interval,
        ) {
            Ok(interval) => interval,
            Err(e) => {
                eprintln!("Failed to resolve data interval: {e}");
                return exit_code(&e);
            }
        };

        let source = match ClickHouseClient::new(config.source.clone()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to create ClickHouse client: {e}");
                return exit_code(&e);
            }
        };

        let query = EventQuery::new(inputs.team_id, interval.start, interval.end);
        let count = match source.is_alive().await {
            Ok(()) => source.count_rows(&query).await,
            Err(e) => Err(e),
        };

        match count {
            Ok(count) => {
                println!("  Team: {}", inputs.team_id);
                println!("  Export: {}", inputs.export_id);
                println!("  Interval: {interval}");
                println!("  Destination Table: {}", inputs.destination.table_name);
                println!("  Rows To Export: {count}");
                println!();
                0
            }
            Err(e) => {
                eprintln!("Failed to count rows: {e}");
                exit_code(&e)
            }
        }
    }
}

/// Wire up the workflow driver for `config`
///
/// # Errors
///
/// Returns an error if the state database or ClickHouse client cannot be
/// set up.
pub async fn build_driver(config: &HarborConfig) -> Result<WorkflowDriver> {
    let (store, audit) = create_state_storage(config).await?;
    store.ensure_schema().await?;

    let source = Arc::new(ClickHouseClient::new(config.source.clone())?);
    let exporter = StreamingExporter::new(
        source,
        Arc::new(DefaultConnector),
        ExportOptions::from_config(&config.export),
    );

    Ok(WorkflowDriver::new(
        Arc::new(RunRecorder::new(store)),
        Arc::new(exporter),
        audit,
        WorkflowPolicies::from_config(&config.workflow),
    ))
}

/// Scheduler values arrive either as JSON or as a bare timestamp string
pub fn parse_scheduler_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Map an error to the process exit code
pub fn exit_code(error: &HarborError) -> i32 {
    match error.kind() {
        ErrorKind::Configuration | ErrorKind::Validation => 2,
        ErrorKind::Connectivity => 4,
        ErrorKind::Cancelled => 130,
        _ => 1,
    }
}
