// Harbor - ClickHouse batch export tool
// Copyright (c) 2025 Harbor Contributors
// Licensed under the MIT License

//! # Harbor - ClickHouse Batch Export
//!
//! Harbor exports the events of one team from ClickHouse into a warehouse or
//! object store, one time interval per run. Each run is recorded in
//! PostgreSQL and driven through a small state machine whose steps are
//! individually timed out, retried and cancellable.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Resolving** the `[start, end)` data interval of a run
//! - **Streaming** rows from ClickHouse into size-bounded chunks, resuming after
//!   mid-stream decode errors
//! - **Loading** staged chunks into the destination table and verifying every
//!   upload and load status
//! - **Recording** run status with forward-only transitions and an audit log
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (interval, export, load, state, workflow)
//! - [`adapters`] - External integrations (ClickHouse, PostgreSQL, local store)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use harbor::cli::commands::run::build_driver;
//! use harbor::config::load_config;
//! use harbor::core::workflow::BatchExportInputs;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("harbor.toml")?;
//!
//!     let mut inputs = BatchExportInputs::from_config(&config.batch_export);
//!     inputs.data_interval_end = Some("2024-01-01 01:00:00".to_string());
//!
//!     let driver = build_driver(&config).await?;
//!     let outcome = driver.run(inputs).await?;
//!
//!     println!("Run {} exported {} rows", outcome.run_id, outcome.summary.rows_exported);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::HarborError`]. Callers branch on
//! [`domain::HarborError::kind`], which also drives retry decisions:
//!
//! ```rust
//! use harbor::domain::{ErrorKind, HarborError};
//!
//! let err = HarborError::Integrity("duplicate key".to_string());
//! assert_eq!(err.kind(), ErrorKind::Integrity);
//! assert!(!err.is_retryable());
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
