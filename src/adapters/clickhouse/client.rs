//! ClickHouse HTTP client
//!
//! Queries go over the HTTP interface with typed query parameters
//! (`{team_id:Int64}`) so no caller-supplied value is ever spliced into SQL.
//! Results are requested as `JSONEachRow` and decoded line by line while the
//! body is still arriving.

use crate::adapters::source::{EventQuery, EventRow, EventSource, RowStream};
use crate::config::ClickHouseConfig;
use crate::core::interval::format_clickhouse_timestamp;
use crate::domain::{HarborError, Result, SourceError};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

/// Columns exported for every event. `_timestamp` is only used as the resume
/// cursor and is stripped before a row is staged.
const SELECT_COLUMNS: &str = r#"
    toString(uuid) AS uuid,
    event,
    properties,
    elements_chain AS elements,
    JSONExtractRaw(properties, '$set') AS people_set,
    JSONExtractRaw(properties, '$set_once') AS people_set_once,
    distinct_id,
    team_id,
    JSONExtractString(properties, '$ip') AS ip,
    JSONExtractString(properties, '$current_url') AS site_url,
    toString(timestamp) AS timestamp,
    toString(_timestamp) AS _timestamp"#;

const WINDOW_FILTER: &str = r#"
WHERE
    team_id = {team_id:Int64}
    AND timestamp >= {data_interval_start:DateTime64(6, 'UTC')}
    AND timestamp < {data_interval_end:DateTime64(6, 'UTC')}"#;

/// ClickHouse client for Harbor
pub struct ClickHouseClient {
    client: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Build a client for the configured server
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HarborError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(username), password) => request.basic_auth(
                username,
                password.as_ref().map(|p| p.expose_secret().as_ref().to_string()),
            ),
            (None, _) => request,
        }
    }

    fn events_sql(&self, projection: &str, query: &EventQuery, suffix: &str) -> String {
        // The cursor column is one of two fixed names, never user input
        let resume = match query.resume_from {
            Some((cursor, _)) => format!(
                "\n    AND {} >= {{resume_from:DateTime64(6, 'UTC')}}",
                cursor.field()
            ),
            None => String::new(),
        };
        format!(
            "SELECT {projection}\nFROM {}{WINDOW_FILTER}{resume}\n{suffix}",
            self.config.table
        )
    }

    /// POST a parameterized query and return the successful response
    async fn send_query(&self, sql: String, query: &EventQuery) -> Result<Response> {
        let mut params = vec![
            ("database", self.config.database.clone()),
            ("param_team_id", query.team_id.value().to_string()),
            (
                "param_data_interval_start",
                format_clickhouse_timestamp(&query.interval_start),
            ),
            (
                "param_data_interval_end",
                format_clickhouse_timestamp(&query.interval_end),
            ),
        ];
        if let Some((_, from)) = query.resume_from {
            params.push(("param_resume_from", format_clickhouse_timestamp(&from)));
        }

        let request = self
            .client
            .post(format!("{}/", self.base_url()))
            .query(&params)
            .body(sql);

        let resp = self
            .with_auth(request)
            .send()
            .await
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::QueryFailed {
                status: status.as_u16(),
                message: body.trim().to_string(),
            }
            .into());
        }

        Ok(resp)
    }
}

#[async_trait]
impl EventSource for ClickHouseClient {
    async fn is_alive(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url());
        let resp = self.client.get(&url).send().await.map_err(|e| {
            SourceError::ConnectionFailed(format!("Cannot establish connection to ClickHouse: {e}"))
        })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() || body.trim() != "Ok." {
            return Err(SourceError::ConnectionFailed(format!(
                "Cannot establish connection to ClickHouse: ping returned {status}"
            ))
            .into());
        }

        tracing::debug!(url = %url, "ClickHouse ping successful");
        Ok(())
    }

    async fn count_rows(&self, query: &EventQuery) -> Result<u64> {
        let sql = self.events_sql("count() AS count", query, "FORMAT JSONEachRow");
        let resp = self.send_query(sql, query).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;

        let row: Value = serde_json::from_str(body.trim()).map_err(|e| {
            SourceError::InvalidResponse(format!("Unexpected count response '{}': {e}", body.trim()))
        })?;

        // 64-bit integers are quoted by default
        let count = match row.get("count") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        count.ok_or_else(|| {
            SourceError::InvalidResponse(format!("Missing count in response '{}'", body.trim()))
                .into()
        })
    }

    async fn stream_rows(&self, query: &EventQuery) -> Result<RowStream> {
        let sql = self.events_sql(
            SELECT_COLUMNS,
            query,
            "ORDER BY _timestamp\nFORMAT JSONEachRow",
        );

        tracing::debug!(
            team_id = %query.team_id,
            interval_start = %query.interval_start,
            interval_end = %query.interval_end,
            resumed = query.resume_from.is_some(),
            "Opening ClickHouse event stream"
        );

        let resp = self.send_query(sql, query).await?;
        Ok(rows_from_body(resp.bytes_stream()))
    }
}

struct LineReader<S> {
    body: Pin<Box<S>>,
    buffer: Vec<u8>,
    exhausted: bool,
    finished: bool,
}

/// Split a `JSONEachRow` body into rows.
///
/// The stream ends after the first transport or decode error.
pub fn rows_from_body<S, B, E>(body: S) -> RowStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let reader = LineReader {
        body: Box::pin(body),
        buffer: Vec::new(),
        exhausted: false,
        finished: false,
    };

    stream::unfold(reader, |mut reader| async move {
        if reader.finished {
            return None;
        }

        loop {
            let line = match reader.buffer.iter().position(|b| *b == b'\n') {
                Some(pos) => Some(reader.buffer.drain(..=pos).collect::<Vec<u8>>()),
                None if reader.exhausted && !reader.buffer.is_empty() => {
                    Some(std::mem::take(&mut reader.buffer))
                }
                None if reader.exhausted => return None,
                None => None,
            };

            if let Some(line) = line {
                let trimmed = line.trim_ascii();
                if trimmed.is_empty() {
                    continue;
                }
                let row = decode_row(trimmed);
                if row.is_err() {
                    reader.finished = true;
                }
                return Some((row, reader));
            }

            match reader.body.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    reader.finished = true;
                    let err = SourceError::ConnectionFailed(format!(
                        "Event stream interrupted: {e}"
                    ));
                    return Some((Err(err.into()), reader));
                }
                None => reader.exhausted = true,
            }
        }
    })
    .boxed()
}

fn decode_row(line: &[u8]) -> Result<EventRow> {
    match serde_json::from_slice::<Value>(line) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(SourceError::Decode(format!("expected a JSON object, got {other}")).into()),
        Err(e) => {
            let preview: String = String::from_utf8_lossy(line).chars().take(200).collect();
            Err(SourceError::Decode(format!("{e} in line '{preview}'")).into())
        }
    }
}
