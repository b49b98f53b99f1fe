//! Run state bookkeeping

pub mod recorder;

pub use recorder::RunRecorder;
