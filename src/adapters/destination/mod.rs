//! Warehouse and object-store destinations
//!
//! Every destination follows the same three-step protocol: provision the
//! target table, stage chunk files one at a time, then load all staged files
//! in one finalize call. Stage and load results carry per-file statuses that
//! the loader verifies.

pub mod factory;
pub mod traits;

pub use factory::{create_destination, DefaultConnector};
pub use traits::{
    Destination, DestinationConnector, LoadFileStatus, StageResponse, LOADED, UPLOADED,
};
