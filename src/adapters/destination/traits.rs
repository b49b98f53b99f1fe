//! Destination traits

use crate::config::{DestinationConfig, DestinationKind};
use crate::domain::ids::TableName;
use crate::domain::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Status a staged file must report
pub const UPLOADED: &str = "UPLOADED";

/// Status a loaded file must report
pub const LOADED: &str = "LOADED";

/// Outcome of staging one chunk file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResponse {
    pub file: String,
    pub status: String,
    pub message: Option<String>,
}

impl StageResponse {
    pub fn uploaded(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: UPLOADED.to_string(),
            message: None,
        }
    }
}

/// Per-file outcome of the finalize call.
///
/// Destinations may omit any field; the loader substitutes defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFileStatus {
    pub file: String,
    pub status: Option<String>,
    pub errors_seen: Option<u64>,
    pub first_error: Option<String>,
}

impl LoadFileStatus {
    pub fn loaded(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: Some(LOADED.to_string()),
            errors_seen: Some(0),
            first_error: None,
        }
    }

    pub fn failed(file: impl Into<String>, status: &str, first_error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: Some(status.to_string()),
            errors_seen: Some(1),
            first_error: Some(first_error.into()),
        }
    }
}

/// A connected warehouse or object store
#[async_trait]
pub trait Destination: Send + Sync {
    fn kind(&self) -> DestinationKind;

    /// Create the target table if it does not exist
    async fn provision_table(&self, table: &TableName) -> Result<()>;

    /// Stage one local chunk file under `file_name`
    async fn stage(
        &self,
        table: &TableName,
        local_file: &Path,
        file_name: &str,
    ) -> Result<StageResponse>;

    /// Load every staged file into the table and clear it from staging
    async fn load(&self, table: &TableName, files: &[String]) -> Result<Vec<LoadFileStatus>>;
}

/// Opens destinations from their configuration
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    /// # Errors
    ///
    /// Returns a connectivity error if the destination cannot be reached.
    async fn connect(&self, config: &DestinationConfig) -> Result<Arc<dyn Destination>>;
}
