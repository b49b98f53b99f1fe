//! Bookkeeping storage abstraction
//!
//! Run records and audit logs are stored in PostgreSQL; this module defines
//! the trait the recorder depends on and the factory that wires it up.

pub mod factory;
pub mod traits;

pub use factory::create_state_storage;
pub use traits::RunStore;
