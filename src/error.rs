//! Error types for the Quarry library.
//!
//! All fallible operations in Quarry report a [`QuarryError`]. The variants
//! mirror the failure modes of the retrieval core: bad inputs, vector
//! dimension disagreements, missing or corrupt collections, and build
//! collisions. Provider and storage failures are wrapped so callers can
//! distinguish them from core errors.

use std::io;

use thiserror::Error;

/// The main error type for Quarry operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// No usable text or vectors to index or query.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Vector length disagrees with the collection's dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Search against an index holding zero vectors.
    #[error("Empty index: {0}")]
    EmptyIndex(String),

    /// Unknown collection id, or no collections exist at all.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Persisted index and metadata disagree, or storage is unreadable.
    #[error("Corrupt collection: {0}")]
    CorruptCollection(String),

    /// A build for the same collection id is already running.
    #[error("Build in progress: {0}")]
    BuildInProgress(String),

    /// Metadata lookup beyond the end of the store.
    #[error("Ordinal {ordinal} out of range for store of length {len}")]
    IndexOutOfRange { ordinal: usize, len: usize },

    /// Boundary validation failure (bad id, zero top_k, bad config).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding or generation provider failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for operations that may fail with QuarryError.
pub type Result<T> = std::result::Result<T, QuarryError>;

impl QuarryError {
    /// Create a new empty-input error.
    pub fn empty_input<S: Into<String>>(msg: S) -> Self {
        QuarryError::EmptyInput(msg.into())
    }

    /// Create a new dimension-mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        QuarryError::DimensionMismatch { expected, actual }
    }

    /// Create a new empty-index error.
    pub fn empty_index<S: Into<String>>(msg: S) -> Self {
        QuarryError::EmptyIndex(msg.into())
    }

    /// Create a new collection-not-found error.
    pub fn collection_not_found<S: Into<String>>(msg: S) -> Self {
        QuarryError::CollectionNotFound(msg.into())
    }

    /// Create a new corrupt-collection error.
    pub fn corrupt_collection<S: Into<String>>(msg: S) -> Self {
        QuarryError::CorruptCollection(msg.into())
    }

    /// Create a new build-in-progress error.
    pub fn build_in_progress<S: Into<String>>(msg: S) -> Self {
        QuarryError::BuildInProgress(msg.into())
    }

    /// Create a new invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        QuarryError::InvalidArgument(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        QuarryError::Storage(msg.into())
    }

    /// Create a new provider error.
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        QuarryError::Provider(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        QuarryError::Serialization(msg.into())
    }
}

impl From<bincode::Error> for QuarryError {
    fn from(err: bincode::Error) -> Self {
        QuarryError::Serialization(err.to_string())
    }
}
