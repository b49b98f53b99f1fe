//! Run record bookkeeping
//!
//! The [`RunRecorder`] creates and updates run records in the backing
//! [`RunStore`]. Both operations are idempotent by run id, so a step that
//! is retried after its side effect landed does not fail.

use crate::adapters::database::traits::RunStore;
use crate::core::workflow::inputs::{CreateRunInputs, UpdateRunStatusInputs};
use crate::domain::ids::{ExportId, RunId};
use crate::domain::run::{BatchExportRun, RunStatus};
use crate::domain::{HarborError, Result};
use std::sync::Arc;

/// Creates and updates run records
pub struct RunRecorder {
    /// Run record storage backend
    store: Arc<dyn RunStore>,
}

impl RunRecorder {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Insert the run in the `Starting` status and return its id
    ///
    /// Re-creating a run that already exists for the same window is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HarborError::Integrity`] when the id is taken by a run for a
    /// different window.
    pub async fn create(&self, inputs: &CreateRunInputs) -> Result<RunId> {
        let run = BatchExportRun::starting(
            inputs.run_id,
            inputs.team_id,
            inputs.export_id,
            inputs.data_interval_start,
            inputs.data_interval_end,
        );

        if self.store.insert_run(&run).await? {
            tracing::info!(
                run_id = %run.id,
                export_id = %run.export_id,
                data_interval_start = %run.data_interval_start,
                data_interval_end = %run.data_interval_end,
                "Created batch export run"
            );
            return Ok(run.id);
        }

        match self.store.get_run(&run.id).await? {
            Some(existing) if existing.same_window(&run) => {
                tracing::debug!(run_id = %run.id, status = %existing.status, "Run already created");
                Ok(run.id)
            }
            Some(existing) => Err(HarborError::Integrity(format!(
                "Run {} already exists for interval {} -> {}",
                run.id, existing.data_interval_start, existing.data_interval_end
            ))),
            None => Err(HarborError::Database(format!(
                "Run {} conflicted on insert but could not be read back",
                run.id
            ))),
        }
    }

    /// Move a run to a new status
    ///
    /// Only forward transitions apply. Re-applying the current status is a
    /// no-op; `latest_error` is stored for `Failed` only.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown run and
    /// [`HarborError::InvalidTransition`] for a backward transition.
    pub async fn update_status(&self, inputs: &UpdateRunStatusInputs) -> Result<()> {
        let latest_error = match inputs.status {
            RunStatus::Failed => inputs.latest_error.as_deref(),
            _ => None,
        };

        let updated = self
            .store
            .update_run_status(
                &inputs.run_id,
                inputs.status,
                latest_error,
                inputs.status.allowed_predecessors(),
            )
            .await?;

        if updated > 0 {
            tracing::info!(
                run_id = %inputs.run_id,
                status = %inputs.status,
                latest_error = latest_error.unwrap_or_default(),
                "Updated batch export run status"
            );
            return Ok(());
        }

        match self.store.get_run(&inputs.run_id).await? {
            None => Err(HarborError::Validation(format!(
                "Run {} does not exist",
                inputs.run_id
            ))),
            Some(run) if run.status == inputs.status => {
                tracing::debug!(run_id = %inputs.run_id, status = %run.status, "Status already applied");
                Ok(())
            }
            Some(run) => Err(HarborError::InvalidTransition {
                entity: format!("run {}", run.id),
                from: run.status.to_string(),
                to: inputs.status.to_string(),
            }),
        }
    }

    pub async fn get(&self, run_id: &RunId) -> Result<Option<BatchExportRun>> {
        self.store.get_run(run_id).await
    }

    /// Most recent runs, optionally for one export
    pub async fn list(&self, export_id: Option<&ExportId>, limit: i64) -> Result<Vec<BatchExportRun>> {
        self.store.list_runs(export_id, limit).await
    }
}
