//! Data types for chunks, search results and answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a stored [`Chunk`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Identifier of the originating document (usually a file name).
    pub source_id: String,
    /// Position of the chunk within its source document.
    pub chunk_index: usize,
    /// When the chunk was appended. Non-decreasing in insertion order.
    pub ingested_at: DateTime<Utc>,
}

/// A segment of a source document with its vector embedding.
///
/// Chunks are immutable once stored; the index only ever appends them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier assigned by the index at insertion.
    pub id: String,
    /// The literal text of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Where the chunk came from.
    pub metadata: ChunkMetadata,
}

/// A chunk waiting to be inserted into the index.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    /// The chunk text.
    pub text: String,
    /// The chunk's embedding.
    pub embedding: Vec<f32>,
    /// Identifier of the originating document.
    pub source_id: String,
    /// Position of the chunk within its source document.
    pub chunk_index: usize,
}

impl NewChunk {
    /// Create a new chunk for insertion.
    pub fn new(
        text: impl Into<String>,
        embedding: Vec<f32>,
        source_id: impl Into<String>,
        chunk_index: usize,
    ) -> Self {
        Self { text: text.into(), embedding, source_id: source_id.into(), chunk_index }
    }
}

/// A retrieved [`Chunk`] paired with its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// The outcome of a question answered against the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryAnswer {
    /// The generated answer, or the insufficient-information message.
    pub answer: String,
    /// The literal text of every chunk placed in the model's context.
    pub chunks_used: Vec<String>,
    /// Number of chunks actually used, which may be smaller than the requested `k`.
    pub chunk_count: usize,
}

/// A summary of what the index currently holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStatus {
    /// Whether any chunk is loaded.
    pub has_documents: bool,
    /// Total number of stored chunks.
    pub chunk_count: usize,
    /// The established embedding dimensionality, if any chunk was inserted.
    pub dimensions: Option<usize>,
    /// Timestamp of the most recent insertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ingested_at: Option<DateTime<Utc>>,
}
