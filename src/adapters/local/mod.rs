//! Local filesystem object store
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<table>/_staging/<file>   staged, not yet visible
//! <root>/<table>/<file>            loaded
//! ```
//!
//! Loading is a rename within one filesystem, so a file is either fully
//! visible or not at all.

use crate::adapters::destination::{Destination, LoadFileStatus, StageResponse};
use crate::config::DestinationKind;
use crate::domain::ids::TableName;
use crate::domain::{DestinationError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

const STAGING_DIR: &str = "_staging";

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn table_dir(&self, table: &TableName) -> PathBuf {
        self.root.join(table.as_str())
    }

    fn staging_dir(&self, table: &TableName) -> PathBuf {
        self.table_dir(table).join(STAGING_DIR)
    }
}

#[async_trait]
impl Destination for LocalObjectStore {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Local
    }

    async fn provision_table(&self, table: &TableName) -> Result<()> {
        let staging = self.staging_dir(table);
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| DestinationError::ProvisionFailed {
                table: table.to_string(),
                message: format!("cannot create {}: {e}", staging.display()),
            })?;
        tracing::debug!(path = %staging.display(), "Local table directory ready");
        Ok(())
    }

    async fn stage(
        &self,
        table: &TableName,
        local_file: &Path,
        file_name: &str,
    ) -> Result<StageResponse> {
        let target = self.staging_dir(table).join(file_name);
        let copied = fs::copy(local_file, &target)
            .await
            .map_err(|e| DestinationError::StageFailed {
                file: file_name.to_string(),
                message: e.to_string(),
            })?;
        let expected = fs::metadata(local_file).await?.len();

        if copied != expected {
            return Ok(StageResponse {
                file: file_name.to_string(),
                status: "SIZE_MISMATCH".to_string(),
                message: Some(format!("copied {copied} of {expected} bytes")),
            });
        }
        Ok(StageResponse::uploaded(file_name))
    }

    async fn load(&self, table: &TableName, files: &[String]) -> Result<Vec<LoadFileStatus>> {
        let staging = self.staging_dir(table);
        let table_dir = self.table_dir(table);
        let mut statuses = Vec::with_capacity(files.len());

        for file in files {
            match fs::rename(staging.join(file), table_dir.join(file)).await {
                Ok(()) => statuses.push(LoadFileStatus::loaded(file.as_str())),
                Err(e) => statuses.push(LoadFileStatus::failed(
                    file.as_str(),
                    "LOAD_FAILED",
                    e.to_string(),
                )),
            }
        }
        Ok(statuses)
    }
}
