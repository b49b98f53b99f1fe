//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use harbor::adapters::database::RunStore;
use harbor::adapters::destination::{
    Destination, DestinationConnector, LoadFileStatus, StageResponse,
};
use harbor::adapters::source::{EventQuery, EventRow, EventSource, RowStream};
use harbor::config::{DestinationConfig, DestinationKind, LocalStoreConfig};
use harbor::core::audit::{AuditRecord, AuditSink};
use harbor::core::export::{read_chunk_rows, ExportOptions, StreamingExporter};
use harbor::core::interval::{format_clickhouse_timestamp, parse_timestamp, ExportInterval};
use harbor::core::state::RunRecorder;
use harbor::core::workflow::{BatchExportInputs, StepPolicy, WorkflowDriver, WorkflowPolicies};
use harbor::domain::ids::{ExportId, RunId, TableName, TeamId};
use harbor::domain::run::{BatchExportRun, RunStatus};
use harbor::domain::{ErrorKind, HarborError, Result, SourceError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EXPORT_ID: &str = "8d0a5c4e-4f55-4b1c-9d43-0e0b3d5b8c11";

pub fn interval_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 4, 20, 14, 0, 0).unwrap()
}

pub fn interval_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 4, 20, 15, 0, 0).unwrap()
}

/// Ingestion time of the `i`-th fake event
pub fn row_timestamp(i: usize) -> DateTime<Utc> {
    interval_start() + ChronoDuration::seconds(i as i64 * 10)
}

pub fn event_row(i: usize) -> EventRow {
    let ts = format_clickhouse_timestamp(&row_timestamp(i));
    match json!({
        "uuid": format!("event-{i:04}"),
        "event": "$pageview",
        "properties": {"$current_url": "https://example.com"},
        "distinct_id": format!("user-{}", i % 3),
        "team_id": 2,
        "timestamp": ts,
        "_timestamp": ts,
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn event_rows(n: usize) -> Vec<EventRow> {
    (0..n).map(event_row).collect()
}

/// In-memory event source with injectable failures
#[derive(Default)]
pub struct FakeSource {
    rows: Vec<EventRow>,
    /// For each stream opened, the number of rows emitted before a decode error
    decode_failures: Mutex<VecDeque<usize>>,
    /// Pings that fail before the source becomes reachable
    unreachable_pings: AtomicU32,
    row_delay: Option<Duration>,
    pub pings: AtomicU32,
    pub queries: Mutex<Vec<EventQuery>>,
}

impl FakeSource {
    pub fn with_rows(rows: Vec<EventRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn failing_decode_after(self, emitted: Vec<usize>) -> Self {
        *self.decode_failures.lock().unwrap() = emitted.into();
        self
    }

    pub fn unreachable_for(self, pings: u32) -> Self {
        self.unreachable_pings.store(pings, Ordering::SeqCst);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.row_delay = Some(delay);
        self
    }

    pub fn streams_opened(&self) -> Vec<EventQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// Rows inside the event-time window, past any resume point, in
    /// ingestion order
    fn matching(&self, query: &EventQuery) -> Vec<EventRow> {
        let read = |row: &EventRow, field: &str| {
            row.get(field)
                .and_then(Value::as_str)
                .and_then(|s| parse_timestamp(s).ok())
        };
        let mut rows: Vec<EventRow> = self
            .rows
            .iter()
            .filter(|row| {
                matches!(read(*row, "timestamp"), Some(ts) if ts >= query.interval_start && ts < query.interval_end)
            })
            .filter(|row| match query.resume_from {
                Some((cursor, from)) => matches!(read(*row, cursor.field()), Some(ts) if ts >= from),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| read(row, "_timestamp"));
        rows
    }
}

#[async_trait]
impl EventSource for FakeSource {
    async fn is_alive(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let remaining = self.unreachable_pings.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unreachable_pings.store(remaining - 1, Ordering::SeqCst);
            return Err(SourceError::ConnectionFailed("connection refused".to_string()).into());
        }
        Ok(())
    }

    async fn count_rows(&self, query: &EventQuery) -> Result<u64> {
        Ok(self.matching(query).len() as u64)
    }

    async fn stream_rows(&self, query: &EventQuery) -> Result<RowStream> {
        self.queries.lock().unwrap().push(*query);

        let mut items: Vec<Result<EventRow>> = self.matching(query).into_iter().map(Ok).collect();
        if let Some(emitted) = self.decode_failures.lock().unwrap().pop_front() {
            items.truncate(emitted);
            items.push(Err(SourceError::Decode(
                "Code: 241. DB::Exception: Memory limit exceeded".to_string(),
            )
            .into()));
        }

        match self.row_delay {
            Some(delay) => Ok(stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed()),
            None => Ok(stream::iter(items).boxed()),
        }
    }
}

/// Destination that keeps every staged row in memory
#[derive(Default)]
pub struct RecordingDestination {
    pub provisions: AtomicU32,
    pub staged: Mutex<Vec<(String, Vec<Value>)>>,
    pub load_calls: Mutex<Vec<Vec<String>>>,
    /// Files next to each chunk when it was staged
    pub chunk_dir_sizes: Mutex<Vec<usize>>,
    stage_status: Mutex<Option<String>>,
    load_failure: Mutex<Option<(String, u64, String)>>,
}

impl RecordingDestination {
    pub fn rejecting_uploads(status: &str) -> Self {
        let destination = Self::default();
        *destination.stage_status.lock().unwrap() = Some(status.to_string());
        destination
    }

    pub fn failing_load(status: &str, errors_seen: u64, first_error: &str) -> Self {
        let destination = Self::default();
        *destination.load_failure.lock().unwrap() =
            Some((status.to_string(), errors_seen, first_error.to_string()));
        destination
    }

    /// Staged rows in staging order
    pub fn staged_rows(&self) -> Vec<Value> {
        self.staged
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }

    pub fn staged_files(&self) -> Vec<String> {
        self.staged
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn loads(&self) -> Vec<Vec<String>> {
        self.load_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Local
    }

    async fn provision_table(&self, _table: &TableName) -> Result<()> {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stage(
        &self,
        _table: &TableName,
        local_file: &Path,
        file_name: &str,
    ) -> Result<StageResponse> {
        if let Some(status) = self.stage_status.lock().unwrap().clone() {
            return Ok(StageResponse {
                file: file_name.to_string(),
                status,
                message: Some("storage quota exceeded".to_string()),
            });
        }

        if let Some(dir) = local_file.parent() {
            let files = std::fs::read_dir(dir)?.count();
            self.chunk_dir_sizes.lock().unwrap().push(files);
        }

        let rows = read_chunk_rows(local_file).await?;
        self.staged
            .lock()
            .unwrap()
            .push((file_name.to_string(), rows));
        Ok(StageResponse::uploaded(file_name))
    }

    async fn load(&self, _table: &TableName, files: &[String]) -> Result<Vec<LoadFileStatus>> {
        self.load_calls.lock().unwrap().push(files.to_vec());
        let failure = self.load_failure.lock().unwrap().clone();

        Ok(files
            .iter()
            .enumerate()
            .map(|(i, file)| match (&failure, i) {
                (Some((status, errors_seen, first_error)), 0) => LoadFileStatus {
                    file: file.clone(),
                    status: Some(status.clone()),
                    errors_seen: Some(*errors_seen),
                    first_error: Some(first_error.clone()),
                },
                _ => LoadFileStatus::loaded(file.as_str()),
            })
            .collect())
    }
}

/// Connector handing out one shared destination
pub struct FakeConnector {
    destination: Arc<RecordingDestination>,
    error: Option<ErrorKind>,
    pub connects: AtomicU32,
}

impl FakeConnector {
    pub fn new(destination: Arc<RecordingDestination>) -> Self {
        Self {
            destination,
            error: None,
            connects: AtomicU32::new(0),
        }
    }

    /// A connector whose connect always fails with `kind`
    pub fn failing(destination: Arc<RecordingDestination>, kind: ErrorKind) -> Self {
        Self {
            error: Some(kind),
            ..Self::new(destination)
        }
    }
}

#[async_trait]
impl DestinationConnector for FakeConnector {
    async fn connect(&self, _config: &DestinationConfig) -> Result<Arc<dyn Destination>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.error {
            Some(ErrorKind::Configuration) => Err(HarborError::Configuration(
                "malformed destination credentials".to_string(),
            )),
            Some(_) => Err(HarborError::Connection("destination unreachable".to_string())),
            None => Ok(self.destination.clone() as Arc<dyn Destination>),
        }
    }
}

/// Run store keeping records and the history of applied statuses
#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<RunId, BatchExportRun>>,
    history: Mutex<Vec<(RunId, RunStatus)>>,
    /// Terminal updates that fail with a database error before one succeeds
    failing_terminal_updates: AtomicU32,
    /// Delay after a record is written, before the insert returns
    insert_delay: Option<Duration>,
}

impl MemoryRunStore {
    pub fn failing_terminal_updates(count: u32) -> Self {
        let store = Self::default();
        store.failing_terminal_updates.store(count, Ordering::SeqCst);
        store
    }

    pub fn slow_inserts(delay: Duration) -> Self {
        Self {
            insert_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn all_runs(&self) -> Vec<BatchExportRun> {
        self.runs.lock().unwrap().values().cloned().collect()
    }

    pub fn only_run(&self) -> BatchExportRun {
        let runs = self.all_runs();
        assert_eq!(runs.len(), 1, "expected exactly one run record");
        runs.into_iter().next().unwrap()
    }

    /// Statuses applied to `run_id`, in order, starting with its creation
    pub fn history(&self, run_id: &RunId) -> Vec<RunStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == run_id)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_run(&self, run: &BatchExportRun) -> Result<bool> {
        {
            let mut runs = self.runs.lock().unwrap();
            if runs.contains_key(&run.id) {
                return Ok(false);
            }
            runs.insert(run.id, run.clone());
            self.history.lock().unwrap().push((run.id, run.status));
        }
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(true)
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<BatchExportRun>> {
        Ok(self.runs.lock().unwrap().get(run_id).cloned())
    }

    async fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        latest_error: Option<&str>,
        allowed_from: &[RunStatus],
    ) -> Result<u64> {
        if status.is_terminal() {
            let remaining = self.failing_terminal_updates.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_terminal_updates
                    .store(remaining - 1, Ordering::SeqCst);
                return Err(HarborError::Database("connection reset by peer".to_string()));
            }
        }

        let mut runs = self.runs.lock().unwrap();
        match runs.get_mut(run_id) {
            Some(run) if allowed_from.contains(&run.status) => {
                run.status = status;
                run.latest_error = latest_error.map(str::to_string);
                run.last_updated_at = Utc::now();
                self.history.lock().unwrap().push((*run_id, status));
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn list_runs(&self, export_id: Option<&ExportId>, limit: i64) -> Result<Vec<BatchExportRun>> {
        let mut runs: Vec<_> = self
            .all_runs()
            .into_iter()
            .filter(|run| export_id.map_or(true, |id| &run.export_id == id))
            .collect();
        runs.sort_by(|a, b| b.data_interval_end.cmp(&a.data_interval_end));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }
}

/// Audit sink keeping every record
#[derive(Default)]
pub struct MemoryAuditSink {
    pub records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn event_types(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.event_type.to_string())
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn emit(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn purge_expired(&self, _retention: ChronoDuration) -> Result<u64> {
        Ok(0)
    }
}

pub fn fast_policy(maximum_attempts: u32, non_retryable: Vec<ErrorKind>) -> StepPolicy {
    StepPolicy {
        start_to_close_timeout: Duration::from_secs(10),
        maximum_attempts,
        initial_interval: Duration::from_millis(1),
        backoff_coefficient: 2.0,
        maximum_interval: Duration::from_millis(5),
        non_retryable,
    }
}

pub fn fast_policies() -> WorkflowPolicies {
    WorkflowPolicies {
        create_run: fast_policy(3, vec![ErrorKind::Integrity]),
        update_status: fast_policy(3, vec![ErrorKind::Integrity]),
        insert: fast_policy(3, Vec::new()),
    }
}

pub fn export_options(chunk_size_bytes: u64) -> ExportOptions {
    ExportOptions {
        chunk_size_bytes,
        max_resumptions: 3,
        ..ExportOptions::default()
    }
}

pub fn local_destination(table_name: &str, root: &str) -> DestinationConfig {
    DestinationConfig {
        kind: DestinationKind::Local,
        table_name: table_name.to_string(),
        postgresql: None,
        local: Some(LocalStoreConfig {
            root: root.to_string(),
        }),
    }
}

/// Inputs for the hour ending at 15:00
pub fn inputs() -> BatchExportInputs {
    BatchExportInputs {
        team_id: TeamId::new(2).unwrap(),
        export_id: ExportId::from_str(EXPORT_ID).unwrap(),
        interval: ExportInterval::Hour,
        destination: local_destination("events", "/unused"),
        data_interval_end: Some("2023-04-20 15:00:00".to_string()),
        scheduled_start_time: None,
    }
}

/// Everything a workflow test inspects
pub struct Harness {
    pub driver: WorkflowDriver,
    pub source: Arc<FakeSource>,
    pub destination: Arc<RecordingDestination>,
    pub connector: Arc<FakeConnector>,
    pub store: Arc<MemoryRunStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub struct HarnessBuilder {
    source: FakeSource,
    destination: RecordingDestination,
    connector_error: Option<ErrorKind>,
    store: MemoryRunStore,
    options: ExportOptions,
    policies: WorkflowPolicies,
}

impl HarnessBuilder {
    pub fn new(source: FakeSource) -> Self {
        Self {
            source,
            destination: RecordingDestination::default(),
            connector_error: None,
            store: MemoryRunStore::default(),
            options: export_options(1024),
            policies: fast_policies(),
        }
    }

    pub fn destination(mut self, destination: RecordingDestination) -> Self {
        self.destination = destination;
        self
    }

    pub fn connector_error(mut self, kind: ErrorKind) -> Self {
        self.connector_error = Some(kind);
        self
    }

    pub fn store(mut self, store: MemoryRunStore) -> Self {
        self.store = store;
        self
    }

    pub fn options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn create_policy(mut self, policy: StepPolicy) -> Self {
        self.policies.create_run = policy;
        self
    }

    pub fn insert_policy(mut self, policy: StepPolicy) -> Self {
        self.policies.insert = policy;
        self
    }

    pub fn build(self) -> Harness {
        let source = Arc::new(self.source);
        let destination = Arc::new(self.destination);
        let connector = Arc::new(match self.connector_error {
            Some(kind) => FakeConnector::failing(destination.clone(), kind),
            None => FakeConnector::new(destination.clone()),
        });
        let store = Arc::new(self.store);
        let audit = Arc::new(MemoryAuditSink::default());

        let exporter = StreamingExporter::new(
            source.clone() as Arc<dyn EventSource>,
            connector.clone() as Arc<dyn DestinationConnector>,
            self.options,
        );
        let driver = WorkflowDriver::new(
            Arc::new(RunRecorder::new(store.clone() as Arc<dyn RunStore>)),
            Arc::new(exporter),
            audit.clone() as Arc<dyn AuditSink>,
            self.policies,
        );

        Harness {
            driver,
            source,
            destination,
            connector,
            store,
            audit,
        }
    }
}

/// Row uuids in the order they were staged
pub fn staged_uuids(destination: &RecordingDestination) -> Vec<String> {
    destination
        .staged_rows()
        .iter()
        .map(|row| row["uuid"].as_str().unwrap_or_default().to_string())
        .collect()
}
