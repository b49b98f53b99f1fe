//! Audit log records for run lifecycle events
//!
//! The driver emits one record when a run starts and one when it ends. Record
//! ids are derived from the run id and event type, so emitting the same event
//! again after a retry targets the same logical record; the sink keeps the
//! write with the highest `version`.

use crate::domain::ids::{ExportId, RunId, TeamId};
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    RunStarted,
    RunCompleted,
    RunFailed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::RunStarted => "run_started",
            AuditEventType::RunCompleted => "run_completed",
            AuditEventType::RunFailed => "run_failed",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static LAST_VERSION: AtomicI64 = AtomicI64::new(0);

/// Microseconds since the epoch, strictly increasing within this process
fn next_version() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_VERSION.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_VERSION.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub team_id: TeamId,
    pub export_id: ExportId,
    pub data_interval_end: DateTime<Utc>,
    pub level: AuditLevel,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub version: i64,
}

impl AuditRecord {
    pub fn new(
        run_id: &RunId,
        team_id: TeamId,
        export_id: ExportId,
        data_interval_end: DateTime<Utc>,
        event_type: AuditEventType,
        message: impl Into<String>,
    ) -> Self {
        let level = match event_type {
            AuditEventType::RunFailed => AuditLevel::Error,
            AuditEventType::RunStarted | AuditEventType::RunCompleted => AuditLevel::Info,
        };

        Self {
            id: Self::record_id(run_id, event_type),
            team_id,
            export_id,
            data_interval_end,
            level,
            event_type,
            message: message.into(),
            timestamp: Utc::now(),
            version: next_version(),
        }
    }

    /// Stable id of the `event_type` record of a run
    pub fn record_id(run_id: &RunId, event_type: AuditEventType) -> Uuid {
        Uuid::new_v5(run_id.as_uuid(), event_type.as_str().as_bytes())
    }
}

/// Destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Write a record, replacing an older version of the same record
    async fn emit(&self, record: &AuditRecord) -> Result<()>;

    /// Delete records older than `retention`; returns how many were removed
    async fn purge_expired(&self, retention: Duration) -> Result<u64>;
}

/// Sink that writes audit records to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, record: &AuditRecord) -> Result<()> {
        tracing::info!(
            audit_id = %record.id,
            team_id = %record.team_id,
            export_id = %record.export_id,
            data_interval_end = %record.data_interval_end,
            level = %record.level,
            event_type = %record.event_type,
            version = record.version,
            "{}",
            record.message
        );
        Ok(())
    }

    async fn purge_expired(&self, _retention: Duration) -> Result<u64> {
        Ok(0)
    }
}
