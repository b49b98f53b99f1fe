//! Domain models and types for Harbor.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`TeamId`], [`ExportId`], [`RunId`], [`TableName`])
//! - **Run records** ([`BatchExportRun`], [`RunStatus`])
//! - **Error types** ([`HarborError`], [`SourceError`], [`DestinationError`], [`ErrorKind`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, HarborError>`]:
//!
//! ```rust
//! use harbor::domain::{HarborError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(HarborError::Validation("bad interval".to_string()))
//! }
//!
//! assert!(!example().unwrap_err().is_retryable());
//! ```

pub mod errors;
pub mod ids;
pub mod result;
pub mod run;

// Re-export commonly used types for convenience
pub use errors::{DestinationError, ErrorKind, HarborError, SourceError};
pub use ids::{ExportId, RunId, TableName, TeamId};
pub use result::Result;
pub use run::{BatchExportRun, RunStatus};
