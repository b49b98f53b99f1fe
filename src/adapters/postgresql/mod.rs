//! PostgreSQL integration
//!
//! PostgreSQL plays two roles: it holds run records and audit logs, and it
//! can serve as a warehouse destination for exported events.

pub mod adapter;
pub mod client;
pub mod models;
pub mod warehouse;

pub use adapter::PostgreSQLAdapter;
pub use client::{redact_connection_string, PostgreSQLClient};
pub use models::{PostgreSQLAuditLog, PostgreSQLRun};
pub use warehouse::PostgreSQLWarehouse;
