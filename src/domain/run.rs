//! Batch export run record
//!
//! One record exists per (export, data interval) attempt. Its status only
//! moves forward: `Starting -> Running -> {Completed | Failed}`.

use crate::domain::errors::HarborError;
use crate::domain::ids::{ExportId, RunId, TeamId};
use crate::domain::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Starting,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Starting => "Starting",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
        }
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Statuses a record may move to `self` from.
    ///
    /// `Starting` has no predecessor: records are only ever created with it.
    pub fn allowed_predecessors(&self) -> &'static [RunStatus] {
        match self {
            RunStatus::Starting => &[],
            RunStatus::Running => &[RunStatus::Starting],
            RunStatus::Completed | RunStatus::Failed => &[RunStatus::Starting, RunStatus::Running],
        }
    }

    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Starting" => Ok(RunStatus::Starting),
            "Running" => Ok(RunStatus::Running),
            "Completed" => Ok(RunStatus::Completed),
            "Failed" => Ok(RunStatus::Failed),
            other => Err(format!("Unknown run status '{other}'")),
        }
    }
}

/// Persisted status record for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExportRun {
    pub id: RunId,
    pub team_id: TeamId,
    pub export_id: ExportId,
    pub data_interval_start: DateTime<Utc>,
    pub data_interval_end: DateTime<Utc>,
    pub status: RunStatus,
    /// Set only while the status is `Failed`
    pub latest_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl BatchExportRun {
    /// A new record in the `Starting` status
    pub fn starting(
        id: RunId,
        team_id: TeamId,
        export_id: ExportId,
        data_interval_start: DateTime<Utc>,
        data_interval_end: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            team_id,
            export_id,
            data_interval_start,
            data_interval_end,
            status: RunStatus::Starting,
            latest_error: None,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Apply a status change in memory.
    ///
    /// Returns `Ok(false)` when the record already has `status` (re-applying is
    /// a no-op) and an [`HarborError::InvalidTransition`] for anything that
    /// would move the record backwards or out of a terminal status.
    pub fn apply_status(&mut self, status: RunStatus, latest_error: Option<&str>) -> Result<bool> {
        if self.status == status {
            return Ok(false);
        }
        if !self.status.can_transition_to(status) {
            return Err(HarborError::InvalidTransition {
                entity: format!("run {}", self.id),
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        self.latest_error = match status {
            RunStatus::Failed => latest_error.map(str::to_string),
            _ => None,
        };
        self.last_updated_at = Utc::now();
        Ok(true)
    }

    /// True when both records describe the same export window
    pub fn same_window(&self, other: &BatchExportRun) -> bool {
        self.team_id == other.team_id
            && self.export_id == other.export_id
            && self.data_interval_start == other.data_interval_start
            && self.data_interval_end == other.data_interval_end
    }
}
