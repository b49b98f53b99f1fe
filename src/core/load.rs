//! Destination finalization with status verification
//!
//! [`DestinationLoader`] wraps a [`Destination`] and turns its raw per-file
//! statuses into typed errors: a chunk that did not report `UPLOADED` fails the
//! attempt before anything is loaded, and any file that did not report
//! `LOADED` fails it after the load.

use crate::adapters::destination::{Destination, LoadFileStatus, StageResponse, LOADED, UPLOADED};
use crate::core::export::SealedChunk;
use crate::domain::ids::TableName;
use crate::domain::{DestinationError, Result};
use std::sync::Arc;

const NO_STATUS: &str = "NO STATUS";
const NO_ERROR_MESSAGE: &str = "NO ERROR MESSAGE";

pub struct DestinationLoader {
    destination: Arc<dyn Destination>,
    table: TableName,
}

impl DestinationLoader {
    pub fn new(destination: Arc<dyn Destination>, table: TableName) -> Self {
        Self { destination, table }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Create the target table if it is missing
    pub async fn provision(&self) -> Result<()> {
        self.destination.provision_table(&self.table).await?;
        tracing::info!(
            table = %self.table,
            destination = ?self.destination.kind(),
            "Destination table ready"
        );
        Ok(())
    }

    /// Stage one chunk and verify the upload.
    ///
    /// Returns the staged file name.
    pub async fn stage_chunk(&self, chunk: &SealedChunk) -> Result<String> {
        let response = self
            .destination
            .stage(&self.table, chunk.path(), chunk.name())
            .await?;
        verify_upload(&self.table, chunk.name(), response)?;

        tracing::debug!(
            file = chunk.name(),
            rows = chunk.rows(),
            bytes = chunk.bytes(),
            "Chunk staged"
        );
        Ok(chunk.name().to_string())
    }

    /// Load every staged file and verify each reports `LOADED`.
    ///
    /// Returns the number of files loaded.
    pub async fn load_and_verify(&self, staged: &[String]) -> Result<usize> {
        let statuses = self.destination.load(&self.table, staged).await?;
        verify_load(&self.table, staged, &statuses)?;

        tracing::info!(table = %self.table, files = staged.len(), "Staged files loaded");
        Ok(staged.len())
    }
}

/// Fail unless the stage response reports `UPLOADED`
pub fn verify_upload(table: &TableName, file: &str, response: StageResponse) -> Result<()> {
    if response.status == UPLOADED {
        return Ok(());
    }
    Err(DestinationError::UploadNotCompleted {
        table: table.to_string(),
        file: file.to_string(),
        status: response.status,
        message: response
            .message
            .unwrap_or_else(|| NO_ERROR_MESSAGE.to_string()),
    }
    .into())
}

/// Fail on the first staged file that did not report `LOADED`.
///
/// A staged file missing from the response counts as `NO STATUS`.
pub fn verify_load(table: &TableName, staged: &[String], statuses: &[LoadFileStatus]) -> Result<()> {
    for status in statuses {
        let reported = status.status.as_deref().unwrap_or(NO_STATUS);
        if reported != LOADED {
            return Err(DestinationError::LoadNotCompleted {
                table: table.to_string(),
                status: reported.to_string(),
                errors_seen: status.errors_seen.unwrap_or(0),
                first_error: status
                    .first_error
                    .clone()
                    .unwrap_or_else(|| NO_ERROR_MESSAGE.to_string()),
            }
            .into());
        }
    }

    if let Some(missing) = staged
        .iter()
        .find(|file| !statuses.iter().any(|s| &s.file == *file))
    {
        return Err(DestinationError::LoadNotCompleted {
            table: table.to_string(),
            status: NO_STATUS.to_string(),
            errors_seen: 0,
            first_error: format!("no load status reported for '{missing}'"),
        }
        .into());
    }
    Ok(())
}
