use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the retrieval core.
///
/// Every library crate in the workspace returns this type; nothing below the
/// hosting application downgrades one of these into an empty result.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Embedding did not finish within {0:?}")]
    EmbeddingTimeout(Duration),

    #[error("No documents have been added to the retriever yet")]
    EmptyIndex,

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Got {vectors} vectors for {segments} segments")]
    LengthMismatch { vectors: usize, segments: usize },

    #[error("No vector store found at {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("Vector store at {} is corrupt: {reason}", .path.display())]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Vector store at {} was built with '{stored}' but the active embedder is '{active}'", .path.display())]
    ModelMismatch { path: PathBuf, stored: String, active: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Vector store write failed: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for both flavours of input-format failure.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_) | Self::MalformedDocument { .. })
    }

    /// Shorthand used by the persistence layer.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::StoreCorrupt { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
