//! Batch manifest: one [`FileEntry`] per file, serialized as JSON and zlib-compressed at the
//! highest level before being split across the lowest sequence numbers of the batch.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{GapError, GapResult};

use super::compress::{compress, decompress};

const MANIFEST_LEVEL: u32 = 9;
const MAX_PLAN_ROUNDS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Sanitized path relative to the batch base directory.
    pub path: String,
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub size: u64,
    pub start_sequence: u32,
    pub chunk_count: u32,
    /// Hex SHA-256 of the uncompressed content.
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub total_chunks: u32,
}

impl FileEntry {
    pub fn new(rel_path: &str, size: u64, chunk_count: u32, checksum: String) -> Self {
        Self {
            path: sanitize_path(rel_path),
            original_path: rel_path.to_string(),
            size,
            start_sequence: 0,
            chunk_count,
            checksum,
            total_chunks: 0,
        }
    }

    /// Data chunk sequence numbers of this file.
    pub fn sequences(&self) -> std::ops::Range<u32> {
        self.start_sequence..self.start_sequence + self.chunk_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub base_directory: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_verification: Option<String>,
    #[serde(default)]
    pub created_time: u64,
    #[serde(default)]
    pub format_version: String,
}

impl Manifest {
    pub fn new(
        files: Vec<FileEntry>,
        base_directory: String,
        key_verification: Option<String>,
        format_version: &str,
    ) -> Self {
        let created_time = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        Self {
            total_files: files.len(),
            files,
            total_chunks: 0,
            base_directory,
            encrypted: key_verification.is_some(),
            key_verification,
            created_time,
            format_version: format_version.to_string(),
        }
    }

    pub fn data_chunks(&self) -> u32 {
        self.files.iter().map(|f| f.chunk_count).sum()
    }

    pub fn to_compressed(&self) -> GapResult<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| GapError::ManifestCorrupt(format!("Serialization failed: {e}")))?;
        compress(&json, MANIFEST_LEVEL)
    }

    pub fn from_compressed(bytes: &[u8]) -> GapResult<Self> {
        let json = decompress(bytes)
            .map_err(|e| GapError::ManifestCorrupt(format!("Decompression failed: {e}")))?;
        serde_json::from_slice(&json).map_err(|e| GapError::ManifestCorrupt(e.to_string()))
    }

    // Lays out sequence numbers assuming `meta_chunks` manifest chunks
    fn assign(&mut self, meta_chunks: u32) {
        let total = meta_chunks + self.data_chunks();
        let mut seq = meta_chunks;
        for f in &mut self.files {
            f.start_sequence = seq;
            f.total_chunks = total;
            seq += f.chunk_count;
        }
        self.total_chunks = total;
    }

    /// Assigns sequence numbers and returns the compressed manifest split into chunk payloads.
    ///
    /// Sequence numbers appear inside the manifest, so its own chunk count feeds back into its
    /// size. The count only ever grows between rounds; when the final stream needs fewer pieces
    /// than planned, the tail pieces are empty.
    pub fn plan(&mut self, chunk_size: usize) -> GapResult<Vec<Vec<u8>>> {
        let mut meta_chunks = 1u32;
        for round in 0..MAX_PLAN_ROUNDS {
            self.assign(meta_chunks);
            let packed = self.to_compressed()?;
            let needed = packed.len().div_ceil(chunk_size).max(1) as u32;
            debug!("Manifest round {round}: {} bytes, {needed} chunks", packed.len());

            if needed <= meta_chunks {
                let mut pieces: Vec<Vec<u8>> =
                    packed.chunks(chunk_size).map(<[u8]>::to_vec).collect();
                pieces.resize(meta_chunks as usize, Vec::new());
                return Ok(pieces);
            }
            meta_chunks = needed;
        }
        Err(GapError::ManifestCorrupt(format!(
            "Manifest chunk count did not settle after {MAX_PLAN_ROUNDS} rounds"
        )))
    }
}

/// Replaces characters that are unsafe in file names with `_`.
pub fn sanitize_path(path: &str) -> String {
    const UNSAFE: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    path.chars().map(|c| if UNSAFE.contains(&c) { '_' } else { c }).collect()
}
