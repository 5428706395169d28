//! Error types for the scaleweave alignment pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for alignment operations.
#[derive(Error, Debug)]
pub enum AlignError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Fusion error: {0}")]
    Fusion(#[from] FusionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Conflicting flags: {0}")]
    ConflictingFlags(String),
}

/// Dataset-related errors (input file set for a graph pair).
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Required input file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Malformed line {line} in {file}: {reason}")]
    MalformedLine {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Empty entity set in {0}")]
    EmptyEntitySet(PathBuf),

    #[error("Triple in {file} references unknown time id {time_id}")]
    UnknownTimeId { file: PathBuf, time_id: u32 },

    #[error("IO error reading {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Embedding-stage errors.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Embedding backend failed: {0}")]
    Backend(String),

    #[error("Cached embeddings not found: {0} (run without --skip-encoding first)")]
    CacheMiss(PathBuf),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Projection-stage errors.
#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("No seed pairs with coverage at any scale")]
    NoUsableSeeds,
}

/// Similarity-index errors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index for scale {0} is empty")]
    EmptyIndex(String),

    #[error("Query vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Fusion-stage errors.
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Fusion received candidates for entity {0} outside the unaligned pool")]
    UnknownSource(u32),
}

/// Result type alias for alignment operations.
pub type Result<T> = std::result::Result<T, AlignError>;
