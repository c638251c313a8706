//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur in ingestion and query operations.
///
/// An empty index or an empty retrieval is never an error: those are
/// represented as empty results.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking, retrieval or composition parameters.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An embedding's length disagrees with the index's established dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality the index (or batch) established.
        expected: usize,
        /// The dimensionality of the offending vector.
        actual: usize,
    },

    /// The embedding capability failed or returned malformed output.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The language-model capability failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure, including the underlying cause.
        message: String,
    },

    /// An index snapshot could not be restored.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// An I/O error while reading documents or snapshots.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A (de)serialization error for snapshots or configuration files.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
