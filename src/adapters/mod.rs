//! External system integrations for Harbor.
//!
//! - [`source`] - Event source trait
//! - [`clickhouse`] - ClickHouse HTTP implementation of the event source
//! - [`destination`] - Destination traits and factory
//! - [`postgresql`] - PostgreSQL run store, audit sink and warehouse destination
//! - [`local`] - Filesystem object-store destination
//! - [`database`] - Bookkeeping storage traits and factory
//!
//! # Design Pattern
//!
//! Adapters isolate external systems behind `async_trait` traits, so the
//! workflow can be driven against in-memory implementations in tests.
//!
//! ```rust,no_run
//! use harbor::adapters::clickhouse::ClickHouseClient;
//! use harbor::adapters::source::{EventQuery, EventSource};
//! use harbor::config::ClickHouseConfig;
//! use harbor::domain::TeamId;
//! use chrono::{Duration, Utc};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClickHouseConfig {
//!     url: "http://localhost:8123".to_string(),
//!     database: "posthog".to_string(),
//!     table: "events".to_string(),
//!     username: None,
//!     password: None,
//!     timeout_seconds: 60,
//! };
//!
//! let source = ClickHouseClient::new(config)?;
//! source.is_alive().await?;
//!
//! let end = Utc::now();
//! let query = EventQuery::new(TeamId::new(2)?, end - Duration::hours(1), end);
//! println!("{} events", source.count_rows(&query).await?);
//! # Ok(())
//! # }
//! ```

pub mod clickhouse;
pub mod database;
pub mod destination;
pub mod local;
pub mod postgresql;
pub mod source;
