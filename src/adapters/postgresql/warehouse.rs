//! PostgreSQL warehouse destination
//!
//! Chunk files are staged into `<table>__harbor_stage`, one row per line,
//! keyed by file name and line number. Loading a file moves its staged rows
//! into the target table in a single statement, so a file is loaded either
//! completely or not at all, and its staging rows are purged on success.
//! Rows left behind by abandoned attempts are purged when the table is next
//! provisioned, once they are older than [`STALE_STAGE_AGE`].

use crate::adapters::destination::{Destination, LoadFileStatus, StageResponse};
use crate::adapters::postgresql::client::{map_pg_error, pg_error_message, PostgreSQLClient};
use crate::config::DestinationKind;
use crate::core::export::read_chunk_rows;
use crate::domain::ids::TableName;
use crate::domain::{DestinationError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

const STAGE_SUFFIX: &str = "__harbor_stage";

/// Staged rows older than this belong to no live attempt
pub const STALE_STAGE_AGE: &str = "2 days";

/// Destination writing into PostgreSQL tables
pub struct PostgreSQLWarehouse {
    client: Arc<PostgreSQLClient>,
}

fn stage_table(table: &TableName) -> Result<TableName> {
    table
        .with_suffix(STAGE_SUFFIX)
        .map_err(|message| {
            DestinationError::ProvisionFailed {
                table: table.to_string(),
                message,
            }
            .into()
        })
}

/// A JSON column that ClickHouse may deliver as an encoded string
fn json_column(field: &str) -> String {
    format!(
        "CASE jsonb_typeof(record->'{field}') \
         WHEN 'string' THEN NULLIF(record->>'{field}', '')::jsonb \
         ELSE record->'{field}' END"
    )
}

fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            uuid TEXT,
            event TEXT,
            properties JSONB,
            elements TEXT,
            people_set JSONB,
            people_set_once JSONB,
            distinct_id TEXT,
            team_id BIGINT,
            ip TEXT,
            site_url TEXT,
            timestamp TIMESTAMPTZ
        )",
        table.quoted()
    )
}

fn create_stage_table_sql(stage: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            file_name TEXT NOT NULL,
            line_number BIGINT NOT NULL,
            record JSONB NOT NULL,
            staged_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (file_name, line_number)
        )",
        stage.quoted()
    )
}

fn purge_stale_stage_sql(stage: &TableName) -> String {
    format!(
        "DELETE FROM {} WHERE staged_at < NOW() - INTERVAL '{STALE_STAGE_AGE}'",
        stage.quoted()
    )
}

fn load_sql(table: &TableName, stage: &TableName) -> String {
    format!(
        "WITH moved AS (
            DELETE FROM {stage} WHERE file_name = $1
            RETURNING line_number, record
        )
        INSERT INTO {table} (
            uuid, event, properties, elements, people_set, people_set_once,
            distinct_id, team_id, ip, site_url, timestamp
        )
        SELECT
            record->>'uuid',
            record->>'event',
            {properties},
            record->>'elements',
            {people_set},
            {people_set_once},
            record->>'distinct_id',
            (record->>'team_id')::bigint,
            NULLIF(record->>'ip', ''),
            NULLIF(record->>'site_url', ''),
            (record->>'timestamp')::timestamp AT TIME ZONE 'UTC'
        FROM moved
        ORDER BY line_number",
        stage = stage.quoted(),
        table = table.quoted(),
        properties = json_column("properties"),
        people_set = json_column("people_set"),
        people_set_once = json_column("people_set_once"),
    )
}

impl PostgreSQLWarehouse {
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Destination for PostgreSQLWarehouse {
    fn kind(&self) -> DestinationKind {
        DestinationKind::PostgreSQL
    }

    async fn provision_table(&self, table: &TableName) -> Result<()> {
        let stage = stage_table(table)?;
        let sql = format!(
            "{};\n{};",
            create_table_sql(table),
            create_stage_table_sql(&stage)
        );
        self.client.batch_execute(&sql).await?;

        let purged = self
            .client
            .execute(purge_stale_stage_sql(&stage).as_str(), &[])
            .await?;
        if purged > 0 {
            tracing::info!(stage = %stage, rows = purged, "Purged stale staged rows");
        }

        tracing::debug!(table = %table, stage = %stage, "Warehouse table provisioned");
        Ok(())
    }

    async fn stage(
        &self,
        table: &TableName,
        local_file: &Path,
        file_name: &str,
    ) -> Result<StageResponse> {
        let stage = stage_table(table)?;
        let rows = read_chunk_rows(local_file).await?;
        let expected = rows.len() as u64;

        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| map_pg_error("Failed to open staging transaction", e))?;

        // Re-staging the same file replaces it
        tx.execute(
            &format!("DELETE FROM {} WHERE file_name = $1", stage.quoted()),
            &[&file_name],
        )
        .await
        .map_err(|e| DestinationError::StageFailed {
            file: file_name.to_string(),
            message: pg_error_message(&e),
        })?;

        let staged = tx
            .execute(
                &format!(
                    "INSERT INTO {} (file_name, line_number, record)
                     SELECT $1, t.ordinality, t.elem
                     FROM jsonb_array_elements($2::jsonb) WITH ORDINALITY AS t(elem, ordinality)",
                    stage.quoted()
                ),
                &[&file_name, &Value::Array(rows)],
            )
            .await
            .map_err(|e| DestinationError::StageFailed {
                file: file_name.to_string(),
                message: pg_error_message(&e),
            })?;

        tx.commit()
            .await
            .map_err(|e| map_pg_error("Failed to commit staged file", e))?;

        if staged != expected {
            return Ok(StageResponse {
                file: file_name.to_string(),
                status: "UPLOAD_FAILED".to_string(),
                message: Some(format!("staged {staged} of {expected} rows")),
            });
        }
        Ok(StageResponse::uploaded(file_name))
    }

    async fn load(&self, table: &TableName, files: &[String]) -> Result<Vec<LoadFileStatus>> {
        let stage = stage_table(table)?;
        let sql = load_sql(table, &stage);
        let conn = self.client.get_connection().await?;
        let mut statuses = Vec::with_capacity(files.len());

        for file in files {
            match conn.execute(sql.as_str(), &[file]).await {
                Ok(0) => statuses.push(LoadFileStatus::failed(
                    file.as_str(),
                    "NOT_STAGED",
                    format!("no staged rows for '{file}'"),
                )),
                Ok(rows) => {
                    tracing::debug!(file = %file, rows = rows, table = %table, "Loaded staged file");
                    statuses.push(LoadFileStatus::loaded(file.as_str()));
                }
                Err(e) if e.as_db_error().is_some() => statuses.push(LoadFileStatus::failed(
                    file.as_str(),
                    "LOAD_FAILED",
                    pg_error_message(&e),
                )),
                Err(e) => return Err(map_pg_error("Failed to load staged file", e)),
            }
        }
        Ok(statuses)
    }
}
