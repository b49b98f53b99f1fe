//! Export summary and reporting

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one export attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Rows written to chunks, including rows re-emitted after a resumption
    pub rows_exported: u64,

    /// Chunks staged at the destination
    pub chunks_staged: usize,

    /// Bytes staged across all chunks
    pub bytes_staged: u64,

    /// Times the row stream was re-opened after a decode error
    pub resumptions: u32,

    /// Staged files loaded into the destination table
    pub files_loaded: usize,

    pub duration_ms: u64,
}

impl ExportSummary {
    /// Summary of a run with no matching rows
    pub fn empty(duration: Duration) -> Self {
        Self::default().with_duration(duration)
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows_exported == 0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            rows_exported = self.rows_exported,
            chunks_staged = self.chunks_staged,
            bytes_staged = self.bytes_staged,
            files_loaded = self.files_loaded,
            resumptions = self.resumptions,
            duration_ms = self.duration_ms,
            "Export summary"
        );

        if self.resumptions > 0 {
            tracing::warn!(
                resumptions = self.resumptions,
                "Row stream was resumed; rows near each resumption point may be duplicated"
            );
        }
    }
}
