//! Streaming export from the event source into destination staging
//!
//! Rows are pulled lazily, serialized to JSON lines and written into
//! size-bounded chunks. Each full chunk is staged immediately and its local
//! file released before the next one fills up, so memory and disk use stay
//! bounded by one chunk regardless of the interval size.
//!
//! When the row stream breaks with a decode error, the exporter re-opens the
//! same event-time window restricted to rows whose cursor column is at or
//! after the last decoded row's cursor. Rows at the cursor may be emitted
//! twice. With the ingestion cursor (the stream order) nothing is skipped.
//! With the event cursor, rows ingested after the failure point whose event
//! time is before the cursor are not re-read; a warning is logged when the
//! export comes up short of the counted rows.

use crate::adapters::destination::DestinationConnector;
use crate::adapters::source::{EventQuery, EventRow, EventSource};
use crate::config::ExportConfig;
use crate::core::export::chunk::ChunkBuffer;
use crate::core::export::summary::ExportSummary;
use crate::core::interval::parse_timestamp;
use crate::core::load::DestinationLoader;
use crate::core::workflow::InsertInputs;
use crate::domain::{HarborError, Result};
use crate::{log_export_complete, log_export_start};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Internal ingestion time column; never staged
pub const INGESTION_TIMESTAMP_FIELD: &str = "_timestamp";

/// Event time column
pub const EVENT_TIMESTAMP_FIELD: &str = "timestamp";

/// Which column a resumed stream restarts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeCursor {
    /// The row's ingestion time. Rows are streamed in this order.
    #[default]
    IngestionTimestamp,
    /// The event's own timestamp
    EventTimestamp,
}

impl ResumeCursor {
    pub fn field(&self) -> &'static str {
        match self {
            ResumeCursor::IngestionTimestamp => INGESTION_TIMESTAMP_FIELD,
            ResumeCursor::EventTimestamp => EVENT_TIMESTAMP_FIELD,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeCursor::IngestionTimestamp => "ingestion_timestamp",
            ResumeCursor::EventTimestamp => "event_timestamp",
        }
    }

    /// Cursor value of a row, if it carries a readable one
    pub fn read(&self, row: &EventRow) -> Option<DateTime<Utc>> {
        match row.get(self.field())? {
            Value::String(text) => parse_timestamp(text).ok(),
            Value::Number(n) => n
                .as_f64()
                .and_then(|secs| DateTime::from_timestamp_micros((secs * 1_000_000.0) as i64)),
            _ => None,
        }
    }
}

impl fmt::Display for ResumeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResumeCursor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ingestion_timestamp" => Ok(ResumeCursor::IngestionTimestamp),
            "event_timestamp" => Ok(ResumeCursor::EventTimestamp),
            other => Err(format!(
                "Unknown resume cursor '{other}'. Must be one of: ingestion_timestamp, event_timestamp"
            )),
        }
    }
}

/// Tuning for the streaming exporter
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// A chunk is staged once it grows past this many bytes
    pub chunk_size_bytes: u64,
    pub resume_cursor: ResumeCursor,
    /// Decode-error resumptions allowed within one attempt
    pub max_resumptions: u32,
    /// Directory for chunk files; the system temp directory when `None`
    pub staging_dir: Option<PathBuf>,
}

impl ExportOptions {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            chunk_size_bytes: config.chunk_size_bytes,
            resume_cursor: config.resume_cursor,
            max_resumptions: config.max_resumptions,
            staging_dir: config.staging_dir.as_ref().map(PathBuf::from),
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// Moves one interval of events into a destination table
pub struct StreamingExporter {
    source: Arc<dyn EventSource>,
    connector: Arc<dyn DestinationConnector>,
    options: ExportOptions,
}

impl StreamingExporter {
    pub fn new(
        source: Arc<dyn EventSource>,
        connector: Arc<dyn DestinationConnector>,
        options: ExportOptions,
    ) -> Self {
        Self {
            source,
            connector,
            options,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn open_chunk(&self, prefix: &str, index: usize) -> Result<ChunkBuffer> {
        ChunkBuffer::new(prefix, index, self.options.staging_dir.as_deref())
    }

    /// Seal a chunk and stage it; the local file is released either way
    async fn flush(
        &self,
        loader: &DestinationLoader,
        buffer: ChunkBuffer,
        staged: &mut Vec<String>,
        summary: &mut ExportSummary,
    ) -> Result<()> {
        let chunk = buffer.seal().await?;
        let name = loader.stage_chunk(&chunk).await?;
        summary.chunks_staged += 1;
        summary.bytes_staged += chunk.bytes();
        staged.push(name);
        Ok(())
    }

    /// Export every event of the interval into the destination table.
    ///
    /// With no matching rows the destination is never contacted.
    ///
    /// # Errors
    ///
    /// Returns source connectivity and query errors, typed upload or load
    /// verification failures, and a decode error once resumptions are
    /// exhausted.
    pub async fn insert_into_destination(&self, inputs: &InsertInputs) -> Result<ExportSummary> {
        let started = Instant::now();
        let table = inputs
            .destination
            .table()
            .map_err(HarborError::Configuration)?;
        let query = EventQuery::new(
            inputs.team_id,
            inputs.data_interval_start,
            inputs.data_interval_end,
        );

        self.source.is_alive().await?;

        let count = self.source.count_rows(&query).await?;
        if count == 0 {
            tracing::info!(
                run_id = %inputs.run_id,
                table = %table,
                "No rows in interval, nothing to export"
            );
            return Ok(ExportSummary::empty(started.elapsed()));
        }

        log_export_start!(
            &inputs.run_id,
            &table,
            format!("{} -> {}", inputs.data_interval_start, inputs.data_interval_end)
        );
        tracing::info!(expected_rows = count, "Counted rows to export");

        let destination = self.connector.connect(&inputs.destination).await?;
        let loader = DestinationLoader::new(destination, table.clone());
        loader.provision().await?;

        let prefix = format!(
            "{}-{}-{}",
            table.table(),
            inputs.data_interval_start.format("%Y%m%dT%H%M%S"),
            inputs.run_id.short()
        );

        let mut summary = ExportSummary::default();
        let mut staged: Vec<String> = Vec::new();
        let mut cursor: Option<DateTime<Utc>> = None;
        let mut buffer = self.open_chunk(&prefix, 0)?;
        let mut rows = self.source.stream_rows(&query).await?;

        while let Some(next) = rows.next().await {
            let mut row = match next {
                Ok(row) => row,
                Err(e) if e.is_decode() => {
                    summary.resumptions += 1;
                    if summary.resumptions > self.options.max_resumptions {
                        tracing::error!(
                            resumptions = summary.resumptions,
                            error = %e,
                            "Giving up after repeated decode errors"
                        );
                        return Err(e);
                    }

                    // Nothing decoded yet: restart the whole window
                    let resumed = match cursor {
                        Some(from) => query.resumed_from(self.options.resume_cursor, from),
                        None => query,
                    };
                    tracing::warn!(
                        error = %e,
                        resume_from = ?cursor,
                        cursor = %self.options.resume_cursor,
                        resumption = summary.resumptions,
                        "Row stream failed to decode, resuming"
                    );
                    rows = self.source.stream_rows(&resumed).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(ts) = self.options.resume_cursor.read(&row) {
                cursor = Some(ts);
            }
            row.remove(INGESTION_TIMESTAMP_FIELD);

            buffer.push_row(&serde_json::to_vec(&row)?).await?;
            summary.rows_exported += 1;

            if buffer.exceeds(self.options.chunk_size_bytes) {
                // At most one chunk file exists at a time
                let index = buffer.index() + 1;
                self.flush(&loader, buffer, &mut staged, &mut summary).await?;
                buffer = self.open_chunk(&prefix, index)?;
            }
        }

        if !buffer.is_empty() {
            self.flush(&loader, buffer, &mut staged, &mut summary).await?;
        }

        if summary.resumptions > 0 && summary.rows_exported < count {
            tracing::warn!(
                expected_rows = count,
                rows_exported = summary.rows_exported,
                cursor = %self.options.resume_cursor,
                "Resumed export produced fewer rows than counted"
            );
        }

        if !staged.is_empty() {
            summary.files_loaded = loader.load_and_verify(&staged).await?;
        }

        let summary = summary.with_duration(started.elapsed());
        log_export_complete!(summary.rows_exported, started.elapsed());
        summary.log_summary();
        Ok(summary)
    }
}
