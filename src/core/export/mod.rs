//! Streaming export
//!
//! - [`exporter`] - Pulls rows from the source and stages them in chunks
//! - [`chunk`] - Size-bounded chunk files and payload reassembly
//! - [`summary`] - Per-attempt export statistics

pub mod chunk;
pub mod exporter;
pub mod summary;

pub use chunk::{
    read_chunk_rows, reassemble_chunks, ChunkBuffer, ChunkPart, ReassembledChunk, SealedChunk,
};
pub use exporter::{ExportOptions, ResumeCursor, StreamingExporter};
pub use summary::ExportSummary;
