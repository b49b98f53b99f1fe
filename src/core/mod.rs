//! Core business logic for Harbor.
//!
//! # Modules
//!
//! - [`interval`] - Data interval resolution
//! - [`export`] - Streaming export into destination staging
//! - [`load`] - Upload and load verification
//! - [`state`] - Run record bookkeeping
//! - [`audit`] - Audit log records
//! - [`workflow`] - Step execution and the run state machine
//!
//! # Run Workflow
//!
//! 1. **Resolve**: Compute the `[start, end)` window of the run
//! 2. **Create**: Insert the run record as `Starting`
//! 3. **Export**: Mark it `Running`, stream rows into staged chunks and load them
//! 4. **Finalize**: Mark it `Completed` or `Failed`, then surface any failure
//!
//! # Example
//!
//! ```rust,no_run
//! use harbor::config::load_config;
//! use harbor::core::workflow::BatchExportInputs;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("harbor.toml")?;
//! let mut inputs = BatchExportInputs::from_config(&config.batch_export);
//! inputs.data_interval_end = Some("2023-04-20T15:00:00Z".to_string());
//!
//! let driver = harbor::cli::commands::run::build_driver(&config).await?;
//! let outcome = driver.run(inputs).await?;
//! println!("Exported {} rows", outcome.summary.rows_exported);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod export;
pub mod interval;
pub mod load;
pub mod state;
pub mod workflow;
