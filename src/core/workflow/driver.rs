//! Batch export workflow driver
//!
//! One call to [`WorkflowDriver::run`] executes one run:
//!
//! ```text
//! Initializing -> RunCreated -> Exporting -> Finalizing -> Done
//! ```
//!
//! Once the run record exists, the driver always reaches `Finalizing` and
//! issues exactly one terminal status update, whatever happened during the
//! export. An export failure is returned to the caller only after that update.

use crate::config::WorkflowConfig;
use crate::core::audit::{AuditEventType, AuditRecord, AuditSink};
use crate::core::export::{ExportSummary, StreamingExporter};
use crate::core::interval::{resolve_data_interval, DataInterval, SchedulerValue};
use crate::core::state::RunRecorder;
use crate::core::workflow::inputs::{
    BatchExportInputs, CreateRunInputs, InsertInputs, UpdateRunStatusInputs,
};
use crate::core::workflow::step::{
    cancelled_error, execute_step, is_cancelled, StepPolicy, BOOKKEEPING_TIMEOUT, INSERT_TIMEOUT,
};
use crate::domain::ids::RunId;
use crate::domain::run::RunStatus;
use crate::domain::{ErrorKind, HarborError, Result};
use crate::log_error_with_context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkflowState {
    Initializing,
    RunCreated,
    Exporting,
    Finalizing,
    Done,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Initializing => "Initializing",
            WorkflowState::RunCreated => "RunCreated",
            WorkflowState::Exporting => "Exporting",
            WorkflowState::Finalizing => "Finalizing",
            WorkflowState::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Forward-only state tracker
#[derive(Debug)]
pub struct StateTracker {
    state: WorkflowState,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Initializing,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Move to `next`, which must come strictly after the current state
    pub fn advance(&mut self, next: WorkflowState) -> Result<()> {
        if next <= self.state {
            return Err(HarborError::InvalidTransition {
                entity: "workflow".to_string(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.state, to = %next, "Workflow state transition");
        self.state = next;
        Ok(())
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Step policies of the workflow
#[derive(Debug, Clone)]
pub struct WorkflowPolicies {
    pub create_run: StepPolicy,
    pub update_status: StepPolicy,
    pub insert: StepPolicy,
}

impl WorkflowPolicies {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            create_run: StepPolicy::from_config(&config.create_run, BOOKKEEPING_TIMEOUT),
            update_status: StepPolicy::from_config(&config.update_status, BOOKKEEPING_TIMEOUT),
            insert: StepPolicy::from_config(&config.insert, INSERT_TIMEOUT),
        }
    }
}

impl Default for WorkflowPolicies {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub run_id: RunId,
    pub interval: DataInterval,
    pub status: RunStatus,
    pub summary: ExportSummary,
}

/// Drives one batch export run through its steps
pub struct WorkflowDriver {
    recorder: Arc<RunRecorder>,
    exporter: Arc<StreamingExporter>,
    audit: Arc<dyn AuditSink>,
    policies: WorkflowPolicies,
    cancel: Option<watch::Receiver<bool>>,
}

impl WorkflowDriver {
    pub fn new(
        recorder: Arc<RunRecorder>,
        exporter: Arc<StreamingExporter>,
        audit: Arc<dyn AuditSink>,
        policies: WorkflowPolicies,
    ) -> Self {
        Self {
            recorder,
            exporter,
            audit,
            policies,
            cancel: None,
        }
    }

    /// Abort cancellable steps once `cancel` turns `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn audit_sink(&self) -> Arc<dyn AuditSink> {
        Arc::clone(&self.audit)
    }

    /// Execute one run.
    ///
    /// # Errors
    ///
    /// Interval resolution errors and a cancellation signal seen before the
    /// run is created are returned without touching the run store. A failed
    /// run creation is followed by a best-effort `Failed` update for the
    /// pre-generated run id. Export errors are returned after the run was marked
    /// `Failed`. A failed terminal update is returned when the export itself
    /// succeeded.
    pub async fn run(&self, inputs: BatchExportInputs) -> Result<WorkflowOutcome> {
        let mut tracker = StateTracker::new();

        let interval = resolve_data_interval(
            inputs.data_interval_end.as_deref(),
            inputs.scheduled_start_time.clone().map(SchedulerValue::from_json),
            inputs.interval,
        )?;

        let create = CreateRunInputs {
            run_id: RunId::generate(),
            team_id: inputs.team_id,
            export_id: inputs.export_id,
            data_interval_start: interval.start,
            data_interval_end: interval.end,
        };
        // Once the insert may have landed, the run must reach a terminal status
        if is_cancelled(self.cancel.as_ref()) {
            return Err(cancelled_error("create_export_run"));
        }
        let recorder = self.recorder.as_ref();
        let created: Result<RunId> = execute_step(
            "create_export_run",
            &self.policies.create_run,
            None,
            &create,
            move |i: CreateRunInputs| async move { recorder.create(&i).await },
        )
        .await;
        let run_id = match created {
            Ok(run_id) => run_id,
            Err(e) => {
                self.abandon_run(create.run_id, &e).await;
                return Err(e);
            }
        };
        tracker.advance(WorkflowState::RunCreated)?;

        self.emit_audit(
            &run_id,
            &inputs,
            &interval,
            AuditEventType::RunStarted,
            format!("Batch export run started for interval {interval}"),
        )
        .await;

        tracker.advance(WorkflowState::Exporting)?;
        let insert = InsertInputs {
            run_id,
            team_id: inputs.team_id,
            destination: inputs.destination.clone(),
            data_interval_start: interval.start,
            data_interval_end: interval.end,
        };
        let exported = self.export(&insert).await;

        tracker.advance(WorkflowState::Finalizing)?;
        let final_status = match &exported {
            Ok(_) => UpdateRunStatusInputs::completed(run_id),
            Err(e) => {
                log_error_with_context!(e, "Batch export failed");
                UpdateRunStatusInputs::failed(run_id, e.to_string())
            }
        };
        let finalized: Result<()> = execute_step(
            "update_export_run_status",
            &self.policies.update_status,
            None,
            &final_status,
            move |i: UpdateRunStatusInputs| async move { recorder.update_status(&i).await },
        )
        .await;

        let (event_type, message) = match &exported {
            Ok(summary) => (
                AuditEventType::RunCompleted,
                format!(
                    "Batch export run completed with {} rows in {} chunks",
                    summary.rows_exported, summary.chunks_staged
                ),
            ),
            Err(e) => (AuditEventType::RunFailed, e.to_string()),
        };
        self.emit_audit(&run_id, &inputs, &interval, event_type, message)
            .await;

        tracker.advance(WorkflowState::Done)?;

        match (exported, finalized) {
            (Ok(summary), Ok(())) => {
                tracing::info!(
                    run_id = %run_id,
                    interval = %interval,
                    rows = summary.rows_exported,
                    "Batch export run completed"
                );
                Ok(WorkflowOutcome {
                    run_id,
                    interval,
                    status: RunStatus::Completed,
                    summary,
                })
            }
            (Ok(_), Err(update_error)) => {
                log_error_with_context!(&update_error, "Failed to record run completion");
                Err(update_error)
            }
            (Err(export_error), Ok(())) => Err(export_error),
            (Err(export_error), Err(update_error)) => {
                log_error_with_context!(&update_error, "Failed to record run failure");
                Err(export_error)
            }
        }
    }

    /// Mark the run as running, then export
    async fn export(&self, insert: &InsertInputs) -> Result<ExportSummary> {
        let recorder = self.recorder.as_ref();
        let exporter = self.exporter.as_ref();

        let _: () = execute_step(
            "update_export_run_status",
            &self.policies.update_status,
            self.cancel.as_ref(),
            &UpdateRunStatusInputs::running(insert.run_id),
            move |i: UpdateRunStatusInputs| async move { recorder.update_status(&i).await },
        )
        .await?;

        execute_step(
            "insert_into_destination",
            &self.policies.insert,
            self.cancel.as_ref(),
            insert,
            move |i: InsertInputs| async move { exporter.insert_into_destination(&i).await },
        )
        .await
    }

    /// Mark a run whose creation failed as `Failed`, in case the record was
    /// written before the step gave up on it
    async fn abandon_run(&self, run_id: RunId, error: &HarborError) {
        // The id belongs to another run
        if error.kind() == ErrorKind::Integrity {
            return;
        }

        let recorder = self.recorder.as_ref();
        let abandoned: Result<()> = execute_step(
            "update_export_run_status",
            &self.policies.update_status,
            None,
            &UpdateRunStatusInputs::failed(run_id, error.to_string()),
            move |i: UpdateRunStatusInputs| async move { recorder.update_status(&i).await },
        )
        .await;

        match abandoned {
            Ok(()) => tracing::warn!(
                run_id = %run_id,
                error = %error,
                "Run record was written before its creation failed; marked as failed"
            ),
            Err(e) if e.kind() == ErrorKind::Validation => {
                tracing::debug!(run_id = %run_id, "No run record was written")
            }
            Err(e) => {
                log_error_with_context!(&e, "Failed to record failure of run creation");
            }
        }
    }

    async fn emit_audit(
        &self,
        run_id: &RunId,
        inputs: &BatchExportInputs,
        interval: &DataInterval,
        event_type: AuditEventType,
        message: String,
    ) {
        let record = AuditRecord::new(
            run_id,
            inputs.team_id,
            inputs.export_id,
            interval.end,
            event_type,
            message,
        );
        if let Err(e) = self.audit.emit(&record).await {
            tracing::warn!(
                run_id = %run_id,
                event_type = %event_type,
                error = %e,
                "Failed to write audit record"
            );
        }
    }
}
