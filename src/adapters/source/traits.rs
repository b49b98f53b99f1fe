//! Event source traits

use crate::core::export::ResumeCursor;
use crate::domain::ids::TeamId;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// One exported event, keyed by column name
pub type EventRow = Map<String, Value>;

/// Rows of one query, in ingestion order.
///
/// A stream ends after yielding its first error.
pub type RowStream = BoxStream<'static, Result<EventRow>>;

/// Half-open time range of events for one team
///
/// The window always applies to the event time. A resumed query keeps the
/// window and additionally drops rows whose cursor column is before
/// `resume_from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQuery {
    pub team_id: TeamId,
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    pub resume_from: Option<(ResumeCursor, DateTime<Utc>)>,
}

impl EventQuery {
    pub fn new(team_id: TeamId, interval_start: DateTime<Utc>, interval_end: DateTime<Utc>) -> Self {
        Self {
            team_id,
            interval_start,
            interval_end,
            resume_from: None,
        }
    }

    /// The same window restarted at `from` on the cursor column
    pub fn resumed_from(&self, cursor: ResumeCursor, from: DateTime<Utc>) -> Self {
        Self {
            resume_from: Some((cursor, from)),
            ..*self
        }
    }
}

/// Read access to the analytics store
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Check that the store answers at all
    ///
    /// # Errors
    ///
    /// Returns a connectivity error if the store cannot be reached.
    async fn is_alive(&self) -> Result<()>;

    /// Number of events matching `query`
    async fn count_rows(&self, query: &EventQuery) -> Result<u64>;

    /// Open a stream of the events matching `query`.
    ///
    /// Rows whose body cannot be decoded surface as a decode error, after
    /// which the stream ends.
    async fn stream_rows(&self, query: &EventQuery) -> Result<RowStream>;
}
