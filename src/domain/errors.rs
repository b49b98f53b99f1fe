//! Domain error types
//!
//! Every failure that can end a workflow step is a [`HarborError`]. Callers
//! branch on [`HarborError::kind`] rather than on message text, and the retry
//! machinery uses [`HarborError::is_retryable`] as its default classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main Harbor error type
#[derive(Debug, Error)]
pub enum HarborError {
    /// Missing or malformed configuration, including unresolvable intervals
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input that has the wrong shape or fails validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Errors raised by the analytics store
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Errors raised by a warehouse or object-store destination
    #[error("Destination error: {0}")]
    Destination(#[from] DestinationError),

    /// Bookkeeping database errors
    #[error("Database error: {0}")]
    Database(String),

    /// Constraint violations reported by the bookkeeping database
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// A state machine refused a transition
    #[error("Invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// A step attempt exceeded its start-to-close timeout
    #[error("Step '{step}' timed out after {timeout_ms}ms")]
    Timeout { step: String, timeout_ms: u64 },

    /// The external cancellation signal fired
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// Analytics store errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// The store could not be reached or dropped the connection
    #[error("Failed to connect to ClickHouse: {0}")]
    ConnectionFailed(String),

    /// The store rejected a query
    #[error("Query failed with status {status}: {message}")]
    QueryFailed { status: u16, message: String },

    /// A row in the result stream could not be decoded.
    ///
    /// Usually the store interleaved an exception message into the body.
    /// The exporter recovers from this by re-opening the stream.
    #[error("Failed to decode row: {0}")]
    Decode(String),

    /// The response did not have the expected shape
    #[error("Invalid response from ClickHouse: {0}")]
    InvalidResponse(String),
}

/// Destination errors
#[derive(Debug, Error)]
pub enum DestinationError {
    /// The destination could not be reached
    #[error("Failed to connect to destination: {0}")]
    ConnectionFailed(String),

    /// Creating the target table failed
    #[error("Failed to provision table '{table}': {message}")]
    ProvisionFailed { table: String, message: String },

    /// The staging request itself failed
    #[error("Failed to stage '{file}': {message}")]
    StageFailed { file: String, message: String },

    /// The finalize request itself failed
    #[error("Failed to load staged files into '{table}': {message}")]
    LoadFailed { table: String, message: String },

    /// A chunk upload reported a status other than `UPLOADED`
    #[error(
        "Upload of '{file}' for table '{table}' expected status 'UPLOADED' but got '{status}': {message}"
    )]
    UploadNotCompleted {
        table: String,
        file: String,
        status: String,
        message: String,
    },

    /// A staged file reported a status other than `LOADED`
    #[error(
        "Load for table '{table}' expected status 'LOADED' but got '{status}' with {errors_seen} errors: {first_error}"
    )]
    LoadNotCompleted {
        table: String,
        status: String,
        errors_seen: u64,
        first_error: String,
    },
}

/// Coarse classification used by retry policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    Connectivity,
    Query,
    Decode,
    UploadNotCompleted,
    LoadNotCompleted,
    Destination,
    Database,
    Integrity,
    InvalidTransition,
    Timeout,
    Cancelled,
    Serialization,
    Io,
}

impl ErrorKind {
    /// Whether errors of this kind are retried when no policy says otherwise
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Connectivity
                | ErrorKind::Query
                | ErrorKind::Decode
                | ErrorKind::Destination
                | ErrorKind::Database
                | ErrorKind::Timeout
                | ErrorKind::Io
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Validation => "validation",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Query => "query",
            ErrorKind::Decode => "decode",
            ErrorKind::UploadNotCompleted => "upload_not_completed",
            ErrorKind::LoadNotCompleted => "load_not_completed",
            ErrorKind::Destination => "destination",
            ErrorKind::Database => "database",
            ErrorKind::Integrity => "integrity",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HarborError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarborError::Configuration(_) => ErrorKind::Configuration,
            HarborError::Validation(_) => ErrorKind::Validation,
            HarborError::Source(e) => match e {
                SourceError::ConnectionFailed(_) => ErrorKind::Connectivity,
                SourceError::QueryFailed { .. } | SourceError::InvalidResponse(_) => {
                    ErrorKind::Query
                }
                SourceError::Decode(_) => ErrorKind::Decode,
            },
            HarborError::Destination(e) => match e {
                DestinationError::ConnectionFailed(_) => ErrorKind::Connectivity,
                DestinationError::UploadNotCompleted { .. } => ErrorKind::UploadNotCompleted,
                DestinationError::LoadNotCompleted { .. } => ErrorKind::LoadNotCompleted,
                DestinationError::ProvisionFailed { .. }
                | DestinationError::StageFailed { .. }
                | DestinationError::LoadFailed { .. } => ErrorKind::Destination,
            },
            HarborError::Database(_) => ErrorKind::Database,
            HarborError::Integrity(_) => ErrorKind::Integrity,
            HarborError::Connection(_) => ErrorKind::Connectivity,
            HarborError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            HarborError::Timeout { .. } => ErrorKind::Timeout,
            HarborError::Cancelled(_) => ErrorKind::Cancelled,
            HarborError::Serialization(_) => ErrorKind::Serialization,
            HarborError::Io(_) => ErrorKind::Io,
        }
    }

    /// Default retry classification, see [`ErrorKind::is_retryable`]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// True for mid-stream decode failures the exporter can resume from
    pub fn is_decode(&self) -> bool {
        self.kind() == ErrorKind::Decode
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for HarborError {
    fn from(err: std::io::Error) -> Self {
        HarborError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for HarborError {
    fn from(err: serde_json::Error) -> Self {
        HarborError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for HarborError {
    fn from(err: toml::de::Error) -> Self {
        HarborError::Configuration(format!("TOML parse error: {err}"))
    }
}
