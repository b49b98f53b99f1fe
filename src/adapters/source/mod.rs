//! Analytics event source abstraction
//!
//! The exporter reads events through [`EventSource`] so that the ClickHouse
//! HTTP client can be swapped for an in-memory source in tests.

pub mod traits;

pub use traits::{EventQuery, EventRow, EventSource, RowStream};
