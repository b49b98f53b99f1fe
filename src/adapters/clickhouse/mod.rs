//! ClickHouse integration
//!
//! Events are read from ClickHouse over its HTTP interface.

pub mod client;

pub use client::{rows_from_body, ClickHouseClient};
