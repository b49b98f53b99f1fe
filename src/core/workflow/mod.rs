//! Batch export workflow
//!
//! - [`inputs`] - Serialized step inputs
//! - [`step`] - Step execution with timeouts, retries and cancellation
//! - [`driver`] - The run state machine

pub mod driver;
pub mod inputs;
pub mod step;

pub use driver::{StateTracker, WorkflowDriver, WorkflowOutcome, WorkflowPolicies, WorkflowState};
pub use inputs::{BatchExportInputs, CreateRunInputs, InsertInputs, UpdateRunStatusInputs};
pub use step::{execute_step, StepPolicy};
