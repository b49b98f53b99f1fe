//! State storage factory

use crate::adapters::database::traits::RunStore;
use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::config::HarborConfig;
use crate::core::audit::{AuditSink, TracingAuditSink};
use crate::domain::Result;
use std::sync::Arc;

/// Create the run store and audit sink from the same connection pool
///
/// When auditing is disabled, audit records only go to the log.
///
/// # Errors
///
/// Returns an error if the state database client cannot be created
pub async fn create_state_storage(
    config: &HarborConfig,
) -> Result<(Arc<dyn RunStore>, Arc<dyn AuditSink>)> {
    tracing::info!("Creating PostgreSQL run store");
    let client = Arc::new(PostgreSQLClient::new(config.state.clone()).await?);
    let adapter = Arc::new(PostgreSQLAdapter::new_with_arc(client));

    let audit: Arc<dyn AuditSink> = if config.audit.enabled {
        adapter.clone()
    } else {
        tracing::info!("Audit table disabled, audit records go to the log only");
        Arc::new(TracingAuditSink)
    };

    Ok((adapter as Arc<dyn RunStore>, audit))
}
