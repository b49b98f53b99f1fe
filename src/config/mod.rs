//! Configuration management for Harbor.
//!
//! Harbor reads one TOML file per export definition, with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `HARBOR_*` environment overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [source]
//! url = "http://clickhouse:8123"
//! database = "posthog"
//! username = "exporter"
//! password = "${HARBOR_SOURCE_PASSWORD}"
//!
//! [state]
//! connection_string = "${HARBOR_STATE_CONNECTION_STRING}"
//!
//! [batch_export]
//! team_id = 2
//! export_id = "6b7d1c1e-5b8f-4a3e-9a53-1f0c2d7e4a10"
//! interval = "hour"
//!
//! [batch_export.destination]
//! kind = "postgresql"
//! table_name = "analytics.events"
//!
//! [batch_export.destination.postgresql]
//! connection_string = "${HARBOR_DESTINATION_CONNECTION_STRING}"
//!
//! [export]
//! chunk_size_bytes = 52428800
//! resume_cursor = "ingestion_timestamp"
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use harbor::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("harbor.toml")?;
//! println!("Exporting team {} every {}", config.batch_export.team_id, config.batch_export.interval);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, AuditConfig, BatchExportConfig, ClickHouseConfig, DestinationConfig,
    DestinationKind, ExportConfig, HarborConfig, LocalStoreConfig, LoggingConfig,
    PostgreSQLConfig, StepPolicyConfig, WorkflowConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
