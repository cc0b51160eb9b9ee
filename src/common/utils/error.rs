use std::path::PathBuf;

use thiserror::Error;

// Error
//------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GapError {
    // Wire format
    #[error("Malformed chunk header: {0}")]
    MalformedHeader(String),
    #[error("Encryption key cannot be empty")]
    EmptyKey,
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Checksum mismatch for chunk {seq}: expected {expected}, got {actual}")]
    ChecksumMismatch { seq: u32, expected: String, actual: String },

    // Transfer
    #[error("Manifest corrupt: {0}")]
    ManifestCorrupt(String),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("File too large: {path} is {size} bytes, limit is {limit}")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("Incomplete file {path}: found {found} of {expected} chunks")]
    IncompleteFile { path: String, found: usize, expected: usize },
    #[error("Output directory is not empty: {0}")]
    OutputNotEmpty(PathBuf),
    #[error("Operation cancelled")]
    Cancelled,

    // Panel builder
    #[error("Payload too large: {size} bytes exceeds capacity of {capacity}")]
    PayloadTooLarge { size: usize, capacity: usize },
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // Panel reader
    #[error("Finder patterns not found")]
    FinderPatternNotFound,
    #[error("Cannot compute homography")]
    SingularMatrix,
    #[error("Too many errors to correct in block {0}")]
    UncorrectableBlock(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type GapResult<T> = Result<T, GapError>;
