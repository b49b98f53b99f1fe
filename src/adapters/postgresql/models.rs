//! PostgreSQL row models
//!
//! Plain column mirrors of the bookkeeping tables and their conversions to
//! and from domain types.

use crate::core::audit::AuditRecord;
use crate::domain::ids::{ExportId, RunId, TeamId};
use crate::domain::run::{BatchExportRun, RunStatus};
use crate::domain::{HarborError, Result};
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

/// Row of the `batch_export_runs` table
#[derive(Debug, Clone)]
pub struct PostgreSQLRun {
    pub id: Uuid,
    pub team_id: i64,
    pub batch_export_id: Uuid,
    pub data_interval_start: DateTime<Utc>,
    pub data_interval_end: DateTime<Utc>,
    pub status: String,
    pub latest_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl PostgreSQLRun {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            team_id: row.get("team_id"),
            batch_export_id: row.get("batch_export_id"),
            data_interval_start: row.get("data_interval_start"),
            data_interval_end: row.get("data_interval_end"),
            status: row.get("status"),
            latest_error: row.get("latest_error"),
            created_at: row.get("created_at"),
            last_updated_at: row.get("last_updated_at"),
        }
    }

    pub fn from_domain(run: &BatchExportRun) -> Self {
        Self {
            id: *run.id.as_uuid(),
            team_id: run.team_id.value(),
            batch_export_id: *run.export_id.as_uuid(),
            data_interval_start: run.data_interval_start,
            data_interval_end: run.data_interval_end,
            status: run.status.as_str().to_string(),
            latest_error: run.latest_error.clone(),
            created_at: run.created_at,
            last_updated_at: run.last_updated_at,
        }
    }

    /// Convert to the domain record
    ///
    /// # Errors
    ///
    /// Returns an error if a stored value is out of range
    pub fn to_domain(self) -> Result<BatchExportRun> {
        let team_id = TeamId::new(self.team_id)
            .map_err(|e| HarborError::Database(format!("Invalid team_id in run {}: {e}", self.id)))?;
        let status: RunStatus = self
            .status
            .parse()
            .map_err(|e| HarborError::Database(format!("Invalid status in run {}: {e}", self.id)))?;

        Ok(BatchExportRun {
            id: RunId::new(self.id),
            team_id,
            export_id: ExportId::new(self.batch_export_id),
            data_interval_start: self.data_interval_start,
            data_interval_end: self.data_interval_end,
            status,
            latest_error: self.latest_error,
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
        })
    }
}

/// Row of the `batch_export_logs` table
#[derive(Debug, Clone)]
pub struct PostgreSQLAuditLog {
    pub id: Uuid,
    pub team_id: i64,
    pub batch_export_id: Uuid,
    pub data_interval_end: DateTime<Utc>,
    pub level: String,
    pub log_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub version: i64,
}

impl PostgreSQLAuditLog {
    pub fn from_domain(record: &AuditRecord) -> Self {
        Self {
            id: record.id,
            team_id: record.team_id.value(),
            batch_export_id: *record.export_id.as_uuid(),
            data_interval_end: record.data_interval_end,
            level: record.level.as_str().to_string(),
            log_type: record.event_type.as_str().to_string(),
            message: record.message.clone(),
            timestamp: record.timestamp,
            version: record.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_roundtrip_through_row_model() {
        let run = BatchExportRun::starting(
            RunId::generate(),
            TeamId::new(7).unwrap(),
            ExportId::new(Uuid::new_v4()),
            Utc.with_ymd_and_hms(2023, 4, 20, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 4, 20, 15, 0, 0).unwrap(),
        );

        let back = PostgreSQLRun::from_domain(&run).to_domain().unwrap();
        assert_eq!(back, run);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let run = BatchExportRun::starting(
            RunId::generate(),
            TeamId::new(7).unwrap(),
            ExportId::new(Uuid::new_v4()),
            Utc::now(),
            Utc::now(),
        );
        let mut row = PostgreSQLRun::from_domain(&run);
        row.status = "Paused".to_string();
        assert!(matches!(row.to_domain(), Err(HarborError::Database(_))));
    }
}
