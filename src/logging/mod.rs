//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted log files with daily or hourly rotation
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Lifecycle macros for runs, steps and retries
//!
//! # Example
//!
//! ```no_run
//! use harbor::logging::init_logging;
//! use harbor::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! tracing::error!(error = "Something went wrong", "Error occurred");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of an export attempt
///
/// # Example
///
/// ```no_run
/// use harbor::log_export_start;
/// use harbor::domain::RunId;
///
/// let run_id = RunId::generate();
/// log_export_start!(&run_id, "events", "2023-04-20 14:00:00 -> 2023-04-20 15:00:00");
/// ```
#[macro_export]
macro_rules! log_export_start {
    ($run_id:expr, $table:expr, $interval:expr) => {
        tracing::info!(
            run_id = %$run_id,
            table = %$table,
            interval = %$interval,
            "Starting export"
        );
    };
}

/// Log the completion of an export attempt
///
/// # Example
///
/// ```no_run
/// use harbor::log_export_complete;
/// use std::time::Duration;
///
/// let rows = 42;
/// let duration = Duration::from_secs(10);
/// log_export_complete!(rows, duration);
/// ```
#[macro_export]
macro_rules! log_export_complete {
    ($rows:expr, $duration:expr) => {
        tracing::info!(
            rows = $rows,
            duration_ms = $duration.as_millis() as u64,
            "Export completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use harbor::log_error_with_context;
/// use harbor::domain::HarborError;
///
/// let error = HarborError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            error_kind = %$error.kind(),
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use harbor::log_retry_attempt;
///
/// log_retry_attempt!("insert_into_destination", 2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($step:expr, $attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            step = $step,
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying step"
        );
    };
}
