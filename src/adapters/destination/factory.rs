//! Destination factory
//!
//! Creates the destination implementation named by the configuration.

use crate::adapters::destination::traits::{Destination, DestinationConnector};
use crate::adapters::local::LocalObjectStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLWarehouse};
use crate::config::{DestinationConfig, DestinationKind};
use crate::domain::{HarborError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Create a destination based on the configuration
///
/// # Errors
///
/// Returns an error if the settings block for the configured kind is missing
/// or the destination cannot be reached.
pub async fn create_destination(config: &DestinationConfig) -> Result<Arc<dyn Destination>> {
    match config.kind {
        DestinationKind::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                HarborError::Configuration(
                    "destination.postgresql is required when kind = \"postgresql\"".to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL warehouse destination");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            client.test_connection().await?;
            tracing::debug!(target_db = %client.connection_string_safe(), "Destination connected");

            Ok(Arc::new(PostgreSQLWarehouse::new(Arc::new(client))) as Arc<dyn Destination>)
        }
        DestinationKind::Local => {
            let local = config.local.as_ref().ok_or_else(|| {
                HarborError::Configuration(
                    "destination.local is required when kind = \"local\"".to_string(),
                )
            })?;

            tracing::info!(root = %local.root, "Creating local object-store destination");
            Ok(Arc::new(LocalObjectStore::new(&local.root)) as Arc<dyn Destination>)
        }
    }
}

/// Connector backed by [`create_destination`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnector;

#[async_trait]
impl DestinationConnector for DefaultConnector {
    async fn connect(&self, config: &DestinationConfig) -> Result<Arc<dyn Destination>> {
        create_destination(config).await
    }
}
