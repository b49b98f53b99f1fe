//! Size-bounded staging chunks
//!
//! Rows are appended as JSON lines to a temporary file. Once the file grows
//! past the configured threshold it is sealed and handed to the destination.
//! The temporary file is removed when the [`SealedChunk`] is dropped, whether
//! or not the upload succeeded.

use crate::domain::{HarborError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// An open chunk accepting rows
pub struct ChunkBuffer {
    name: String,
    index: usize,
    rows: usize,
    bytes: u64,
    file: NamedTempFile,
    writer: BufWriter<File>,
}

impl ChunkBuffer {
    /// Open an empty chunk backed by a temporary file.
    ///
    /// The file lives in `dir`, or the system temp directory when `None`.
    pub fn new(prefix: &str, index: usize, dir: Option<&Path>) -> Result<Self> {
        let builder_result = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("harbor-").suffix(".jsonl");
            match dir {
                Some(dir) => builder.tempfile_in(dir),
                None => builder.tempfile(),
            }
        };
        let file = builder_result
            .map_err(|e| HarborError::Io(format!("Failed to create chunk file: {e}")))?;
        let handle = file
            .as_file()
            .try_clone()
            .map_err(|e| HarborError::Io(format!("Failed to open chunk file: {e}")))?;

        Ok(Self {
            name: format!("{prefix}-{index:05}.jsonl"),
            index,
            rows: 0,
            bytes: 0,
            file,
            writer: BufWriter::new(File::from_std(handle)),
        })
    }

    /// Append one serialized row followed by a newline
    pub async fn push_row(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line).await?;
        self.writer.write_all(b"\n").await?;
        self.rows += 1;
        self.bytes += line.len() as u64 + 1;
        Ok(())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// True once more than `threshold` bytes have been written
    pub fn exceeds(&self, threshold: u64) -> bool {
        self.bytes > threshold
    }

    /// Flush buffered bytes and close the chunk for writing
    pub async fn seal(mut self) -> Result<SealedChunk> {
        self.writer
            .flush()
            .await
            .map_err(|e| HarborError::Io(format!("Failed to flush chunk file: {e}")))?;
        self.writer.into_inner().sync_data().await?;

        Ok(SealedChunk {
            name: self.name,
            index: self.index,
            rows: self.rows,
            bytes: self.bytes,
            file: self.file,
        })
    }
}

/// A complete chunk ready for staging
#[derive(Debug)]
pub struct SealedChunk {
    name: String,
    index: usize,
    rows: usize,
    bytes: u64,
    file: NamedTempFile,
}

impl SealedChunk {
    /// Name the chunk is staged under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Local path of the chunk file
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Read every row of a chunk file, in order
pub async fn read_chunk_rows(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut rows = Vec::new();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| {
            HarborError::Serialization(format!(
                "Invalid JSON on line {} of {}: {}",
                line_no,
                path.display(),
                e
            ))
        })?;
        rows.push(value);
    }
    Ok(rows)
}

/// One piece of a payload split across several messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPart {
    pub chunk_id: String,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub data: Vec<u8>,
}

/// A payload rebuilt from all of its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledChunk {
    pub chunk_id: String,
    pub data: Vec<u8>,
}

/// Rebuild payloads from their parts.
///
/// Parts are grouped by `chunk_id` and concatenated in `chunk_index` order.
/// A group missing any of its declared parts is logged and skipped; the rest
/// of the batch is still returned.
pub fn reassemble_chunks(parts: Vec<ChunkPart>) -> Vec<ReassembledChunk> {
    let mut groups: BTreeMap<String, Vec<ChunkPart>> = BTreeMap::new();
    for part in parts {
        groups.entry(part.chunk_id.clone()).or_default().push(part);
    }

    let mut complete = Vec::with_capacity(groups.len());
    for (chunk_id, mut group) in groups {
        group.sort_by_key(|p| p.chunk_index);
        group.dedup_by_key(|p| p.chunk_index);

        let expected = group.first().map(|p| p.chunk_count).unwrap_or(0);
        let contiguous = group
            .iter()
            .enumerate()
            .all(|(i, p)| p.chunk_index == i && p.chunk_count == expected);

        if group.len() != expected || !contiguous {
            tracing::warn!(
                chunk_id = %chunk_id,
                expected_parts = expected,
                received_parts = group.len(),
                "Missing chunks for payload, skipping"
            );
            continue;
        }

        let data = group.into_iter().flat_map(|p| p.data).collect();
        complete.push(ReassembledChunk { chunk_id, data });
    }
    complete
}
