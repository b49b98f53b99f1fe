//! PostgreSQL adapter implementing the bookkeeping traits
//!
//! Run records go to `batch_export_runs`, audit records to
//! `batch_export_logs`. Both tables are created by the bundled migration.

use crate::adapters::database::traits::RunStore;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{PostgreSQLAuditLog, PostgreSQLRun};
use crate::core::audit::{AuditRecord, AuditSink};
use crate::domain::ids::{ExportId, RunId};
use crate::domain::run::{BatchExportRun, RunStatus};
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const RUN_COLUMNS: &str = "id, team_id, batch_export_id, data_interval_start, data_interval_end, \
                           status, latest_error, created_at, last_updated_at";

/// PostgreSQL implementation of [`RunStore`] and [`AuditSink`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a new PostgreSQL adapter with an Arc-wrapped client
    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl RunStore for PostgreSQLAdapter {
    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_database_exists().await
    }

    async fn insert_run(&self, run: &BatchExportRun) -> Result<bool> {
        let row = PostgreSQLRun::from_domain(run);

        let statement = format!(
            "INSERT INTO batch_export_runs ({RUN_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO NOTHING"
        );

        let inserted = self
            .client
            .execute(
                &statement,
                &[
                    &row.id,
                    &row.team_id,
                    &row.batch_export_id,
                    &row.data_interval_start,
                    &row.data_interval_end,
                    &row.status,
                    &row.latest_error,
                    &row.created_at,
                    &row.last_updated_at,
                ],
            )
            .await?;

        tracing::debug!(run_id = %run.id, inserted = inserted == 1, "Run record insert");
        Ok(inserted == 1)
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<BatchExportRun>> {
        let query = format!("SELECT {RUN_COLUMNS} FROM batch_export_runs WHERE id = $1");
        let rows = self.client.query(&query, &[run_id.as_uuid()]).await?;

        rows.first()
            .map(|row| PostgreSQLRun::from_row(row).to_domain())
            .transpose()
    }

    async fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        latest_error: Option<&str>,
        allowed_from: &[RunStatus],
    ) -> Result<u64> {
        let allowed: Vec<String> = allowed_from.iter().map(|s| s.as_str().to_string()).collect();

        let updated = self
            .client
            .execute(
                "UPDATE batch_export_runs
                 SET status = $2, latest_error = $3, last_updated_at = NOW()
                 WHERE id = $1 AND status = ANY($4)",
                &[run_id.as_uuid(), &status.as_str(), &latest_error, &allowed],
            )
            .await?;

        tracing::debug!(
            run_id = %run_id,
            status = %status,
            updated = updated,
            "Run status update"
        );
        Ok(updated)
    }

    async fn list_runs(
        &self,
        export_id: Option<&ExportId>,
        limit: i64,
    ) -> Result<Vec<BatchExportRun>> {
        let export_filter: Option<Uuid> = export_id.map(|id| *id.as_uuid());
        let query = format!(
            "SELECT {RUN_COLUMNS} FROM batch_export_runs
             WHERE ($1::uuid IS NULL OR batch_export_id = $1)
             ORDER BY data_interval_end DESC
             LIMIT $2"
        );

        let rows = self.client.query(&query, &[&export_filter, &limit]).await?;
        rows.iter()
            .map(|row| PostgreSQLRun::from_row(row).to_domain())
            .collect()
    }
}

#[async_trait]
impl AuditSink for PostgreSQLAdapter {
    async fn emit(&self, record: &AuditRecord) -> Result<()> {
        let row = PostgreSQLAuditLog::from_domain(record);

        // Last write wins by version; an older replay leaves the row alone
        self.client
            .execute(
                "INSERT INTO batch_export_logs (
                    id, team_id, batch_export_id, data_interval_end,
                    level, type, message, timestamp, version
                 )
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (id) DO UPDATE SET
                    level = EXCLUDED.level,
                    type = EXCLUDED.type,
                    message = EXCLUDED.message,
                    timestamp = EXCLUDED.timestamp,
                    version = EXCLUDED.version
                 WHERE batch_export_logs.version < EXCLUDED.version",
                &[
                    &row.id,
                    &row.team_id,
                    &row.batch_export_id,
                    &row.data_interval_end,
                    &row.level,
                    &row.log_type,
                    &row.message,
                    &row.timestamp,
                    &row.version,
                ],
            )
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, retention: Duration) -> Result<u64> {
        let cutoff = Utc::now() - retention;
        let purged = self
            .client
            .execute(
                "DELETE FROM batch_export_logs WHERE timestamp < $1",
                &[&cutoff],
            )
            .await?;

        if purged > 0 {
            tracing::info!(purged = purged, cutoff = %cutoff, "Purged expired audit records");
        }
        Ok(purged)
    }
}
