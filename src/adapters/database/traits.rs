//! Bookkeeping storage traits
//!
//! Run records live behind [`RunStore`] so the recorder can be exercised
//! against an in-memory store.

use crate::domain::ids::{ExportId, RunId};
use crate::domain::run::{BatchExportRun, RunStatus};
use crate::domain::Result;
use async_trait::async_trait;

/// Persistence for batch export run records
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create the run and audit tables if they do not exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert a new record.
    ///
    /// Returns `false` when a record with the same id already exists; the
    /// existing record is left untouched.
    async fn insert_run(&self, run: &BatchExportRun) -> Result<bool>;

    async fn get_run(&self, run_id: &RunId) -> Result<Option<BatchExportRun>>;

    /// Conditionally move a record to `status`.
    ///
    /// The update only applies while the stored status is one of
    /// `allowed_from`. Returns the number of records changed (0 or 1).
    async fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        latest_error: Option<&str>,
        allowed_from: &[RunStatus],
    ) -> Result<u64>;

    /// Most recent runs first, by data interval end
    async fn list_runs(&self, export_id: Option<&ExportId>, limit: i64)
        -> Result<Vec<BatchExportRun>>;
}
