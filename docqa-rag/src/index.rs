//! Append-only in-memory vector index using cosine similarity.
//!
//! [`VectorIndex`] keeps every chunk together with an L2-normalized copy of
//! its embedding behind a single `tokio::sync::RwLock`. Each
//! [`insert`](VectorIndex::insert) holds the write lock for the whole batch,
//! so readers observe either none or all of a batch, and concurrent writers
//! never lose or duplicate chunks.
//!
//! The index can be written to and restored from a JSON snapshot with
//! [`save`](VectorIndex::save) and [`load`](VectorIndex::load).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::{Chunk, ChunkMetadata, IndexStatus, NewChunk, SearchResult};
use crate::error::{RagError, Result};
use crate::similarity::{dot, normalize};

const SNAPSHOT_VERSION: u32 = 1;

/// A stored chunk and its unit-length embedding.
#[derive(Debug)]
struct Entry {
    chunk: Chunk,
    unit: Vec<f32>,
}

impl Entry {
    fn new(chunk: Chunk) -> Self {
        let unit = normalize(&chunk.embedding);
        Self { chunk, unit }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    /// Fixed by the first insertion; `None` while the index is empty.
    dimensions: Option<usize>,
    entries: Vec<Entry>,
    last_ingested_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    dimensions: Option<usize>,
    chunks: Vec<&'a Chunk>,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    dimensions: Option<usize>,
    chunks: Vec<Chunk>,
}

/// An append-only vector index for document chunks.
///
/// Construct one at startup and share it behind an `Arc`; all methods take
/// `&self`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{NewChunk, VectorIndex};
///
/// let index = VectorIndex::new();
/// index.insert(vec![NewChunk::new("text", embedding, "notes.txt", 0)]).await?;
/// let results = index.search_by_vector(&query_embedding, 5).await?;
/// ```
#[derive(Debug, Default)]
pub struct VectorIndex {
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append chunks, assigning each a unique id and an ingestion timestamp.
    ///
    /// Returns the number of chunks inserted. The batch is validated before
    /// anything is appended, so a failed insert leaves the index unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any embedding is empty or
    /// its length differs from the established dimensionality (or, on an
    /// empty index, from the first embedding of the batch), and
    /// [`RagError::EmbeddingError`] if any embedding holds a NaN or infinite
    /// component, since those cannot be scored or written to a snapshot.
    pub async fn insert(&self, chunks: Vec<NewChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write().await;
        let expected = state.dimensions.unwrap_or(chunks[0].embedding.len());
        for chunk in &chunks {
            let actual = chunk.embedding.len();
            if actual == 0 || actual != expected {
                return Err(RagError::DimensionMismatch { expected: expected.max(1), actual });
            }
            if !chunk.embedding.iter().all(|x| x.is_finite()) {
                return Err(RagError::EmbeddingError {
                    provider: "index".to_string(),
                    message: format!(
                        "embedding for chunk {} of '{}' contains non-finite values",
                        chunk.chunk_index, chunk.source_id
                    ),
                });
            }
        }

        // Timestamps never go backwards, even if the wall clock does.
        let now = Utc::now();
        let stamp = state.last_ingested_at.map_or(now, |last| last.max(now));

        let inserted = chunks.len();
        state.entries.reserve(inserted);
        for new in chunks {
            state.entries.push(Entry::new(Chunk {
                id: Uuid::new_v4().to_string(),
                text: new.text,
                embedding: new.embedding,
                metadata: ChunkMetadata {
                    source_id: new.source_id,
                    chunk_index: new.chunk_index,
                    ingested_at: stamp,
                },
            }));
        }
        state.dimensions = Some(expected);
        state.last_ingested_at = Some(stamp);

        debug!(inserted, total = state.entries.len(), dimensions = expected, "inserted chunks");
        Ok(inserted)
    }

    /// Return the `candidate_pool_size` chunks most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// insertion order. An empty index yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the index is non-empty and
    /// `query` has a different dimensionality.
    pub async fn search_by_vector(
        &self,
        query: &[f32],
        candidate_pool_size: usize,
    ) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;
        let Some(dimensions) = state.dimensions else {
            return Ok(Vec::new());
        };
        if query.len() != dimensions {
            return Err(RagError::DimensionMismatch { expected: dimensions, actual: query.len() });
        }
        if candidate_pool_size == 0 || state.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query = normalize(query);
        let mut scored: Vec<(usize, f32)> = state
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, dot(&query, &entry.unit)))
            .collect();

        let by_rank =
            |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0));
        if candidate_pool_size < scored.len() {
            scored.select_nth_unstable_by(candidate_pool_size - 1, by_rank);
            scored.truncate(candidate_pool_size);
        }
        scored.sort_unstable_by(by_rank);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: state.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Total number of chunks currently held.
    pub async fn count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// The established embedding dimensionality, if any chunk was inserted.
    pub async fn dimensions(&self) -> Option<usize> {
        self.state.read().await.dimensions
    }

    /// Summarize what the index holds.
    pub async fn status(&self) -> IndexStatus {
        let state = self.state.read().await;
        IndexStatus {
            has_documents: !state.entries.is_empty(),
            chunk_count: state.entries.len(),
            dimensions: state.dimensions,
            last_ingested_at: state.last_ingested_at,
        }
    }

    /// Remove every chunk and forget the established dimensionality.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let removed = state.entries.len();
        *state = IndexState::default();
        info!(removed, "cleared vector index");
    }

    /// Write a JSON snapshot of the index to `path`.
    ///
    /// The snapshot is written to a sibling temporary file first and then
    /// renamed into place.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let (json, count) = {
            let state = self.state.read().await;
            let snapshot = SnapshotRef {
                version: SNAPSHOT_VERSION,
                dimensions: state.dimensions,
                chunks: state.entries.iter().map(|e| &e.chunk).collect(),
            };
            (serde_json::to_vec(&snapshot)?, state.entries.len())
        };

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(path = %path.display(), chunk_count = count, "saved index snapshot");
        Ok(())
    }

    /// Restore an index from a snapshot written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read,
    /// [`RagError::Serialization`] if it is not a snapshot, and
    /// [`RagError::PersistenceError`] if its version or dimensions are
    /// inconsistent.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RagError::PersistenceError(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        let dimensions = match (snapshot.dimensions, snapshot.chunks.is_empty()) {
            (None, true) => None,
            (Some(d), false) if d > 0 => Some(d),
            (dimensions, _) => {
                return Err(RagError::PersistenceError(format!(
                    "snapshot declares dimensions {dimensions:?} for {} chunks",
                    snapshot.chunks.len()
                )));
            }
        };
        if let Some(expected) = dimensions {
            if let Some(bad) = snapshot.chunks.iter().find(|c| c.embedding.len() != expected) {
                return Err(RagError::PersistenceError(format!(
                    "chunk '{}' has {} dimensions, snapshot declares {expected}",
                    bad.id,
                    bad.embedding.len()
                )));
            }
        }

        let last_ingested_at = snapshot.chunks.iter().map(|c| c.metadata.ingested_at).max();
        let entries: Vec<Entry> = snapshot.chunks.into_iter().map(Entry::new).collect();
        info!(path = %path.display(), chunk_count = entries.len(), "loaded index snapshot");

        Ok(Self { state: RwLock::new(IndexState { dimensions, entries, last_ingested_at }) })
    }

    /// Like [`load`](Self::load), but returns an empty index if `path` does
    /// not exist.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path).await {
            Err(RagError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            other => other,
        }
    }
}
